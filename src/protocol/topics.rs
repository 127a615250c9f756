//! MQTT topic name and topic filter validation
//!
//! Publish topics must be concrete topic names. Subscribe topics may be
//! filters using the `+` (single level) and `#` (multi level) wildcards.

use thiserror::Error;

/// Validate a topic name used for PUBLISH packets
pub fn validate_topic_name(topic: &str) -> Result<(), TopicError> {
    check_common(topic)?;

    if let Some(ch) = topic.chars().find(|c| *c == '+' || *c == '#') {
        return Err(TopicError::WildcardInTopicName(ch));
    }

    Ok(())
}

/// Validate a topic filter used for SUBSCRIBE packets
pub fn validate_topic_filter(filter: &str) -> Result<(), TopicError> {
    check_common(filter)?;

    let levels: Vec<&str> = filter.split('/').collect();
    let last = levels.len() - 1;

    for (index, level) in levels.iter().enumerate() {
        if level.contains('#') && (*level != "#" || index != last) {
            return Err(TopicError::MisplacedMultiLevelWildcard);
        }
        if level.contains('+') && *level != "+" {
            return Err(TopicError::MisplacedSingleLevelWildcard);
        }
    }

    Ok(())
}

fn check_common(topic: &str) -> Result<(), TopicError> {
    if topic.is_empty() {
        return Err(TopicError::Empty);
    }
    // MQTT caps UTF-8 encoded strings at 65535 bytes
    if topic.len() > u16::MAX as usize {
        return Err(TopicError::TooLong(topic.len()));
    }
    if topic.contains('\0') {
        return Err(TopicError::NullCharacter);
    }
    Ok(())
}

/// Topic validation errors
#[derive(Debug, Error, PartialEq)]
pub enum TopicError {
    #[error("Topic cannot be empty")]
    Empty,
    #[error("Topic is {0} bytes, maximum is 65535")]
    TooLong(usize),
    #[error("Topic contains a NUL character")]
    NullCharacter,
    #[error("Topic name cannot contain wildcard '{0}'")]
    WildcardInTopicName(char),
    #[error("'#' must be the last level of a topic filter and occupy the whole level")]
    MisplacedMultiLevelWildcard,
    #[error("'+' must occupy a whole topic level")]
    MisplacedSingleLevelWildcard,
}
