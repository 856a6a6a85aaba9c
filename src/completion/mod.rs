// Completion module
// The chat-completion capability and the fixed prompts used for answering

use async_trait::async_trait;

use crate::Result;

/// Instruction sent as the system turn of every answer request
pub const SYSTEM_PROMPT: &str = "Use the following pieces of context to answer the question at the end. \
If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// Produces a chat completion for a system instruction and a user turn
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String>;
}

/// Build the user turn carrying the retrieved context and the question verbatim
#[inline]
pub fn build_user_prompt(context: &str, question: &str) -> String {
    format!("Context: {}\n\nQuestion: {}", context, question)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_prompt_keeps_question_verbatim() {
        let prompt = build_user_prompt("The sky is blue.", "  What colour is the sky?? ");
        assert_eq!(
            prompt,
            "Context: The sky is blue.\n\nQuestion:   What colour is the sky?? "
        );
    }

    #[test]
    fn system_prompt_forbids_fabrication() {
        assert!(SYSTEM_PROMPT.contains("don't know"));
        assert!(SYSTEM_PROMPT.contains("context"));
    }
}
