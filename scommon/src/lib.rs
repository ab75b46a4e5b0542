//! Shared utilities and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use scommon::{GenerationOptions, MetadataMap, ThreadId};
//!
//! let thread = ThreadId::new();
//! let parsed = ThreadId::parse(&thread.to_string()).expect("thread id should parse");
//! let mut metadata = MetadataMap::new();
//! metadata.insert("client".to_string(), "editor".to_string());
//!
//! let options = GenerationOptions::default().with_temperature(0.3);
//! assert_eq!(parsed, thread);
//! assert_eq!(options.temperature, Some(0.3));
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use scommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod context {
    //! Shared metadata and the thread identity newtype.
    //!
    //! ```rust
    //! use scommon::ThreadId;
    //!
    //! let id = ThreadId::parse("0f8fad5b-d9cb-469f-a165-70867728950e").expect("valid uuid");
    //! assert_eq!(id.to_string(), "0f8fad5b-d9cb-469f-a165-70867728950e");
    //! assert!(ThreadId::parse("not-a-uuid").is_none());
    //! ```

    use std::collections::HashMap;
    use std::fmt::{Display, Formatter};
    use std::str::FromStr;

    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    pub type MetadataMap = HashMap<String, String>;

    /// Durable conversation identity carried inside assistant content.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct ThreadId(Uuid);

    impl ThreadId {
        /// Length of the hyphenated textual form.
        pub const TEXT_LEN: usize = 36;

        pub fn new() -> Self {
            Self(Uuid::new_v4())
        }

        pub fn parse(value: &str) -> Option<Self> {
            Uuid::parse_str(value.trim()).ok().map(Self)
        }

        pub fn as_uuid(&self) -> &Uuid {
            &self.0
        }
    }

    impl Default for ThreadId {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Display for ThreadId {
        fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
            write!(f, "{}", self.0.hyphenated())
        }
    }

    impl FromStr for ThreadId {
        type Err = uuid::Error;

        fn from_str(value: &str) -> Result<Self, Self::Err> {
            Uuid::parse_str(value.trim()).map(Self)
        }
    }

    impl From<Uuid> for ThreadId {
        fn from(value: Uuid) -> Self {
            Self(value)
        }
    }
}

pub mod model {
    //! Shared generation settings used by request types.
    //!
    //! ```rust
    //! use scommon::GenerationOptions;
    //!
    //! let options = GenerationOptions::default()
    //!     .with_temperature(0.2)
    //!     .with_max_tokens(128);
    //!
    //! assert_eq!(options.temperature, Some(0.2));
    //! assert_eq!(options.max_tokens, Some(128));
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct GenerationOptions {
        pub temperature: Option<f32>,
        pub max_tokens: Option<u32>,
    }

    impl GenerationOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }
    }
}

pub mod registry {
    //! Generic registry map wrapper used by runtime registries.
    //!
    //! ```rust
    //! use scommon::Registry;
    //!
    //! let mut registry = Registry::new();
    //! registry.insert("alpha".to_string(), 1_u32);
    //!
    //! assert_eq!(registry.get("alpha"), Some(&1));
    //! assert!(registry.contains_key("alpha"));
    //! ```

    use std::borrow::Borrow;
    use std::collections::HashMap;
    use std::hash::Hash;

    #[derive(Debug, Clone)]
    pub struct Registry<K, V> {
        items: HashMap<K, V>,
    }

    impl<K, V> Default for Registry<K, V>
    where
        K: Eq + Hash,
    {
        fn default() -> Self {
            Self {
                items: HashMap::new(),
            }
        }
    }

    impl<K, V> Registry<K, V>
    where
        K: Eq + Hash,
    {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert(&mut self, key: K, value: V) -> Option<V> {
            self.items.insert(key, value)
        }

        pub fn get<Q>(&self, key: &Q) -> Option<&V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.get(key)
        }

        pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.remove(key)
        }

        pub fn contains_key<Q>(&self, key: &Q) -> bool
        where
            K: Borrow<Q>,
            Q: Eq + Hash + ?Sized,
        {
            self.items.contains_key(key)
        }

        pub fn keys(&self) -> impl Iterator<Item = &K> {
            self.items.keys()
        }

        pub fn values(&self) -> impl Iterator<Item = &V> {
            self.items.values()
        }

        pub fn len(&self) -> usize {
            self.items.len()
        }

        pub fn is_empty(&self) -> bool {
            self.items.is_empty()
        }
    }
}

pub mod time {
    //! Wall-clock helpers shared by chunk stamping and event records.

    use std::time::{SystemTime, UNIX_EPOCH};

    pub fn unix_seconds() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default()
    }

    pub fn unix_millis() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_millis() as u64)
            .unwrap_or_default()
    }
}

pub use context::{MetadataMap, ThreadId};
pub use future::BoxFuture;
pub use model::GenerationOptions;
pub use registry::Registry;
pub use time::{unix_millis, unix_seconds};

#[cfg(test)]
mod tests {
    use super::{GenerationOptions, Registry, ThreadId};

    #[test]
    fn thread_id_round_trips_text_and_json() {
        let id = ThreadId::new();
        let text = id.to_string();
        assert_eq!(text.len(), ThreadId::TEXT_LEN);
        assert_eq!(ThreadId::parse(&text), Some(id));

        let json = serde_json::to_string(&id).expect("thread id should serialize");
        assert_eq!(json, format!("\"{text}\""));
        let back: ThreadId = serde_json::from_str(&json).expect("thread id should deserialize");
        assert_eq!(back, id);
    }

    #[test]
    fn thread_id_rejects_garbage() {
        assert!(ThreadId::parse("thread-1").is_none());
        assert!("".parse::<ThreadId>().is_err());
    }

    #[test]
    fn generation_options_builder_helpers_set_values() {
        let options = GenerationOptions::default()
            .with_temperature(0.3)
            .with_max_tokens(123);

        assert_eq!(options.temperature, Some(0.3));
        assert_eq!(options.max_tokens, Some(123));
    }

    #[test]
    fn generic_registry_basic_lifecycle() {
        let mut registry = Registry::new();
        assert!(registry.is_empty());

        registry.insert("alpha".to_string(), 1_u32);
        assert_eq!(registry.get("alpha"), Some(&1));
        assert!(registry.contains_key("alpha"));
        assert_eq!(registry.keys().count(), 1);

        let removed = registry.remove("alpha");
        assert_eq!(removed, Some(1));
        assert!(registry.is_empty());
    }
}
