//! Prompts sent to response backends
//!
//! The persona instruction rides along with every chat completion; the task
//! prompts drive one-shot calls (titles, image analysis).

pub mod persona_prompt;
pub mod task_prompts;

pub use persona_prompt::{persona_prompt, PERSONA_PROMPT};
pub use task_prompts::{image_analysis_prompt, relay_image_prompt, title_prompt};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_not_empty() {
        assert!(!persona_prompt().is_empty());
        assert!(!title_prompt("hi").is_empty());
        assert!(!image_analysis_prompt(None).is_empty());
    }

    #[test]
    fn test_title_prompt_embeds_message_verbatim() {
        let prompt = title_prompt("Tell me about Diwali");
        assert!(prompt.contains("Tell me about Diwali"));
    }
}
