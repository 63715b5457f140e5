use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use strum::Display;

/// Who authored a chat turn. The display string is the author id used to
/// look up display metadata in [`AUTHORS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Author {
    #[strum(serialize = "user")]
    User,
    #[strum(serialize = "gen-ai")]
    Assistant,
}

impl Author {
    /// Role this author takes in a request payload. The user maps to
    /// `user`; every other author speaks as the assistant.
    pub fn role(self) -> Role {
        match self {
            Author::User => Role::User,
            _ => Role::Assistant,
        }
    }
}

/// Message role as the Converse API expects it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// Avatar style for an author.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvatarKind {
    User,
    GenAi,
}

/// Display metadata for a chat author.
#[derive(Debug, Clone, Copy)]
pub struct AuthorInfo {
    pub name: &'static str,
    pub initials: Option<&'static str>,
    pub kind: AvatarKind,
}

/// Static author registry, keyed by author id.
pub static AUTHORS: Lazy<HashMap<String, AuthorInfo>> = Lazy::new(|| {
    let mut authors = HashMap::new();
    authors.insert(
        Author::User.to_string(),
        AuthorInfo {
            name: "User",
            initials: Some("U"),
            kind: AvatarKind::User,
        },
    );
    authors.insert(
        Author::Assistant.to_string(),
        AuthorInfo {
            name: "Generative AI assistant",
            initials: None,
            kind: AvatarKind::GenAi,
        },
    );
    authors
});

/// One chat bubble. `text` grows while a response streams in; `pending`
/// drives the loading indicator on the avatar.
#[derive(Debug, Clone, PartialEq)]
pub struct Turn {
    pub author: Author,
    pub text: String,
    pub pending: bool,
}

/// An error surfaced to the user inside the transcript. Never mutated
/// after it is appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub title: Option<String>,
    pub text: String,
}

/// A single entry in the conversation.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Turn(Turn),
    Notice(Notice),
}

impl Message {
    /// A completed user turn carrying the submitted prompt.
    pub fn user(text: impl Into<String>) -> Self {
        Message::Turn(Turn {
            author: Author::User,
            text: text.into(),
            pending: false,
        })
    }

    /// A completed assistant turn.
    pub fn assistant(text: impl Into<String>) -> Self {
        Message::Turn(Turn {
            author: Author::Assistant,
            text: text.into(),
            pending: false,
        })
    }

    /// The empty assistant slot appended on submit, filled as the
    /// response arrives.
    pub fn assistant_placeholder() -> Self {
        Message::Turn(Turn {
            author: Author::Assistant,
            text: String::new(),
            pending: true,
        })
    }

    /// An error notice.
    pub fn notice(text: impl Into<String>) -> Self {
        Message::Notice(Notice {
            title: Some("Request failed".to_string()),
            text: text.into(),
        })
    }
}

/// One message as it goes over the wire.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiMessage {
    pub role: Role,
    pub content: Vec<ContentBlock>,
}

/// Converse content block. Only text blocks are used here.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContentBlock {
    pub text: String,
}

impl ApiMessage {
    pub fn new(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            content: vec![ContentBlock { text: text.into() }],
        }
    }
}

/// Build the request payload for a conversation. The last element is the
/// pending assistant slot being filled and is excluded; notices are not
/// part of the exchange and are skipped. Order is preserved.
pub fn request_messages(conversation: &[Message]) -> Vec<ApiMessage> {
    let end = conversation.len().saturating_sub(1);
    conversation[..end]
        .iter()
        .filter_map(|message| match message {
            Message::Turn(turn) => Some(ApiMessage::new(turn.author.role(), turn.text.clone())),
            Message::Notice(_) => None,
        })
        .collect()
}

/// The fixed example transcript behind the "load example" action.
pub fn example_transcript() -> Vec<Message> {
    vec![
        Message::user("What can I do with Amazon S3?"),
        Message::assistant(
            "Amazon S3 provides a simple web service interface that you can use to store \
             and retrieve any amount of data, at any time, from anywhere. Using this \
             service, you can easily build applications that make use of cloud native \
             storage. Since Amazon S3 is highly scalable and you only pay for what you \
             use, you can start small and grow your application as you wish, with no \
             compromise on performance or reliability.",
        ),
        Message::user("How can I create an S3 bucket configuration?"),
        Message::assistant(
            "Creating a configuration for Amazon S3 involves setting up a bucket and \
             configuring its properties. Here's a step-by-step guide to help you create \
             an S3 configuration:\n\
             1. Sign in to AWS Management Console\n\
             2. Access Amazon S3 console\n\
             3. Create a new S3 bucket\n\
             4. Configure bucket settings\n\
             5. Review and create",
        ),
        Message::user("Give me an example of a Typescript code block."),
        Message::assistant(
            "Here's a simple TypeScript code example that implements the 'Hello, World!' \
             functionality:",
        ),
        Message::assistant(
            "function main(): void {\n  console.log(\"Hello, World!\");\n}\nmain();",
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_excludes_pending_slot() {
        let conversation = vec![
            Message::user("hello"),
            Message::assistant_placeholder(),
        ];
        let payload = request_messages(&conversation);
        assert_eq!(payload.len(), 1);
        assert_eq!(payload[0].role, Role::User);
        assert_eq!(payload[0].content[0].text, "hello");
    }

    #[test]
    fn payload_skips_notices_and_keeps_order() {
        let conversation = vec![
            Message::user("first"),
            Message::assistant("reply"),
            Message::notice("throttled"),
            Message::user("second"),
            Message::assistant_placeholder(),
        ];
        let payload = request_messages(&conversation);
        assert_eq!(payload.len(), 3);
        assert_eq!(payload[0].content[0].text, "first");
        assert_eq!(payload[0].role, Role::User);
        assert_eq!(payload[1].content[0].text, "reply");
        assert_eq!(payload[1].role, Role::Assistant);
        assert_eq!(payload[2].content[0].text, "second");
        assert_eq!(payload[2].role, Role::User);
    }

    #[test]
    fn payload_of_empty_conversation_is_empty() {
        assert!(request_messages(&[]).is_empty());
    }

    #[test]
    fn roles_serialize_lowercase() {
        let message = ApiMessage::new(Role::Assistant, "hi");
        let json = serde_json::to_value(&message).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"][0]["text"], "hi");
    }

    #[test]
    fn author_registry_covers_both_authors() {
        assert_eq!(AUTHORS.get("user").unwrap().name, "User");
        assert_eq!(
            AUTHORS.get(&Author::Assistant.to_string()).unwrap().name,
            "Generative AI assistant"
        );
    }

    #[test]
    fn example_transcript_has_no_pending_turns() {
        let transcript = example_transcript();
        assert!(!transcript.is_empty());
        for message in &transcript {
            match message {
                Message::Turn(turn) => assert!(!turn.pending),
                Message::Notice(_) => panic!("example transcript contains a notice"),
            }
        }
    }
}
