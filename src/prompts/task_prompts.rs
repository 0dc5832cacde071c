//! One-shot task prompts: conversation titles and image analysis

use super::persona_prompt::PERSONA_PROMPT;

/// Prompt used when the caller gives no question about an image
pub const DEFAULT_IMAGE_PROMPT: &str =
    "Please analyze this image and provide a detailed description.";

/// Builds the title-generation prompt for a conversation's first message
///
/// # Examples
///
/// ```
/// use bharat_ai::prompts::task_prompts::title_prompt;
///
/// let prompt = title_prompt("What is the capital of France?");
/// assert!(prompt.contains("\"What is the capital of France?\""));
/// assert!(prompt.contains("50 characters"));
/// ```
pub fn title_prompt(first_message: &str) -> String {
    format!(
        r#"Generate a short, descriptive title (2-6 words) for a chat conversation that starts with this message: "{}"

The title should be:
- Concise and descriptive
- Relevant to the main topic
- Maximum 50 characters

Return ONLY the title, nothing else."#,
        first_message
    )
}

/// Builds the image-analysis prompt
///
/// With a user question the model answers it; without one it describes the
/// image in detail. Both variants carry the persona.
pub fn image_analysis_prompt(user_prompt: Option<&str>) -> String {
    match user_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(question) => format!(
            "{}\n\nThe user has shared an image and asks: \"{}\"\n\nAnalyze the image and answer the question.",
            PERSONA_PROMPT, question
        ),
        None => format!(
            "{}\n\nDescribe this image in detail. Include objects, people, visible text, colors and anything else notable.",
            PERSONA_PROMPT
        ),
    }
}

/// The prompt forwarded to a relay that takes a bare prompt field
pub fn relay_image_prompt(user_prompt: Option<&str>) -> String {
    user_prompt
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_IMAGE_PROMPT)
        .to_string()
}
