//! Pulls the assistant reply out of a provider completion.

use super::providers::ProviderError;
use crate::models::{ChatCompletion, FinishReason};

/// Return the first choice's message content, unmodified.
///
/// An empty choice list or a choice without content is a provider protocol
/// violation and is reported, never replaced by an empty string.
pub fn extract_reply(completion: ChatCompletion) -> Result<String, ProviderError> {
    let choice = completion
        .choices
        .into_iter()
        .next()
        .ok_or(ProviderError::NoChoices)?;

    match choice.message.and_then(|m| m.content) {
        Some(content) => Ok(content),
        None if choice.finish_reason == Some(FinishReason::ContentFilter) => {
            Err(ProviderError::ContentFiltered)
        }
        None => Err(ProviderError::MissingContent),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Choice, ReplyMessage, Role};
    use crate::services::providers::mock::completion_with_text;

    fn choice(content: Option<&str>, finish_reason: Option<FinishReason>) -> Choice {
        Choice {
            index: 0,
            message: Some(ReplyMessage {
                role: Some(Role::Assistant),
                content: content.map(String::from),
            }),
            finish_reason,
        }
    }

    #[test]
    fn returns_first_choice_verbatim() {
        let mut completion = completion_with_text("  An ITSO product is...\n");
        completion
            .choices
            .push(choice(Some("second answer"), Some(FinishReason::Stop)));

        assert_eq!(extract_reply(completion).unwrap(), "  An ITSO product is...\n");
    }

    #[test]
    fn empty_content_is_returned_as_is() {
        let completion = completion_with_text("");
        assert_eq!(extract_reply(completion).unwrap(), "");
    }

    #[test]
    fn no_choices_is_an_error() {
        assert_eq!(
            extract_reply(ChatCompletion::default()),
            Err(ProviderError::NoChoices)
        );
    }

    #[test]
    fn missing_content_is_an_error() {
        let completion = ChatCompletion {
            choices: vec![choice(None, Some(FinishReason::Stop))],
            usage: None,
        };
        assert_eq!(extract_reply(completion), Err(ProviderError::MissingContent));

        let completion = ChatCompletion {
            choices: vec![Choice {
                index: 0,
                message: None,
                finish_reason: None,
            }],
            usage: None,
        };
        assert_eq!(extract_reply(completion), Err(ProviderError::MissingContent));
    }

    #[test]
    fn filtered_choice_without_content_is_reported() {
        let completion = ChatCompletion {
            choices: vec![choice(None, Some(FinishReason::ContentFilter))],
            usage: None,
        };
        assert_eq!(extract_reply(completion), Err(ProviderError::ContentFiltered));
    }
}
