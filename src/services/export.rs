use crate::models::Conversation;

pub fn export_to_markdown(conversation: &Conversation) -> String {
    let mut output = format!("# {}\n\n", conversation.title);
    output.push_str(&format!(
        "> Date: {}\n\n",
        conversation.created_at.format("%Y-%m-%d %H:%M")
    ));

    output.push_str("---\n\n");

    for msg in &conversation.messages {
        output.push_str(&format!("### {}\n\n{}\n\n", msg.role.display_name(), msg.text));
    }

    output
}
