use serde::{Deserialize, Serialize};

/// Top-level collections in the document store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Collection {
    Users,
    Posts,
    Comments,
    NewsItems,
    TopicEngagement,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Posts => "posts",
            Collection::Comments => "comments",
            Collection::NewsItems => "newsItems",
            Collection::TopicEngagement => "topicEngagement",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
