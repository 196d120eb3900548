/*
[INPUT]:  Stream events in arrival order
[OUTPUT]: Per-topic data sets and consistent copies for callers
[POS]:    WebSocket layer - local state merged from snapshot/insert/update/delete frames
[UPDATE]: When changing merge semantics, natural keys or retention
*/

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use indexmap::IndexMap;
use serde_json::Value;
use tracing::{debug, warn};

use crate::ws::message::{Action, StreamEvent};
use crate::ws::topic::{KeySpec, PositionKeying, TopicKind, consumes_on_read_by_default, topic_name};

pub const DEFAULT_MAX_DATA_LENGTH: usize = 200;

/// Retention and keying rules for a [`TopicStore`].
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Maximum entries kept per feed topic (oldest dropped first)
    pub max_data_length: usize,
    pub position: PositionKeying,
    /// Per-topic overrides of the consume-on-read default, by topic key or
    /// topic family
    pub consume_on_read: HashMap<String, bool>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_data_length: DEFAULT_MAX_DATA_LENGTH,
            position: PositionKeying::default(),
            consume_on_read: HashMap::new(),
        }
    }
}

#[derive(Debug)]
enum DataSet {
    Keyed {
        key_spec: KeySpec,
        entries: IndexMap<String, Value>,
    },
    Feed(VecDeque<Value>),
    Latest(Vec<Value>),
}

impl DataSet {
    fn for_topic(topic: &str) -> Self {
        match TopicKind::for_name(topic_name(topic)) {
            TopicKind::Keyed(key_spec) => DataSet::Keyed {
                key_spec,
                entries: IndexMap::new(),
            },
            TopicKind::Feed => DataSet::Feed(VecDeque::new()),
            TopicKind::Latest => DataSet::Latest(Vec::new()),
        }
    }

    fn snapshot(&self) -> Vec<Value> {
        match self {
            DataSet::Keyed { entries, .. } => entries.values().cloned().collect(),
            DataSet::Feed(items) => items.iter().cloned().collect(),
            DataSet::Latest(items) => items.clone(),
        }
    }

    fn clear(&mut self) {
        match self {
            DataSet::Keyed { entries, .. } => entries.clear(),
            DataSet::Feed(items) => items.clear(),
            DataSet::Latest(items) => items.clear(),
        }
    }
}

/// Topic data sets for one streaming session.
///
/// Every frame is applied under a single lock acquisition, and `fetch` copies
/// (and optionally drains) under the same lock, so readers never observe a
/// partially merged frame.
#[derive(Debug)]
pub struct TopicStore {
    settings: StoreSettings,
    /// Topic keys the session subscribed to
    configured: HashSet<String>,
    topics: Mutex<HashMap<String, DataSet>>,
}

impl TopicStore {
    pub fn new(settings: StoreSettings, configured: impl IntoIterator<Item = String>) -> Self {
        Self {
            settings,
            configured: configured.into_iter().collect(),
            topics: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, DataSet>> {
        self.topics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create an empty data set, keeping any existing one.
    pub fn register(&self, topic: &str) {
        self.lock()
            .entry(topic.to_string())
            .or_insert_with(|| DataSet::for_topic(topic));
    }

    pub fn remove(&self, topic: &str) {
        self.lock().remove(topic);
    }

    pub fn is_registered(&self, topic: &str) -> bool {
        self.lock().contains_key(topic)
    }

    /// Registered topic keys, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self.lock().keys().cloned().collect();
        topics.sort();
        topics
    }

    /// Apply one frame's events in order.
    ///
    /// Events for topics outside the subscription set are ignored. A
    /// subscribed topic without a data set yet is created on first data.
    pub fn apply(&self, events: Vec<StreamEvent>) {
        let mut topics = self.lock();
        for event in events {
            if !topics.contains_key(&event.topic) {
                if !self.configured.contains(&event.topic) {
                    debug!(topic = %event.topic, "data for unsubscribed topic ignored");
                    continue;
                }
                topics.insert(event.topic.clone(), DataSet::for_topic(&event.topic));
            }
            if let Some(set) = topics.get_mut(&event.topic) {
                self.merge(set, &event);
            }
        }
    }

    fn merge(&self, set: &mut DataSet, event: &StreamEvent) {
        let topic = event.topic.as_str();
        match set {
            DataSet::Keyed { key_spec, entries } => {
                if event.action == Action::Snapshot {
                    entries.clear();
                }
                let action = match (*key_spec, event.action) {
                    // Position and wallet pushes are full records and never
                    // follow a snapshot.
                    (KeySpec::Position | KeySpec::Wallet, Action::Update) => Action::Upsert,
                    (_, action) => action,
                };
                for entry in &event.entries {
                    let Some(key) = key_spec.key_of(entry, &self.settings.position) else {
                        warn!(topic, ?entry, "entry without natural key dropped");
                        continue;
                    };
                    apply_keyed(topic, entries, key, entry, action);
                }
            }
            DataSet::Feed(items) => {
                match event.action {
                    Action::Snapshot => {
                        items.clear();
                        items.extend(event.entries.iter().cloned());
                    }
                    Action::Insert | Action::Upsert => {
                        items.extend(event.entries.iter().cloned());
                    }
                    Action::Update | Action::Delete => {
                        warn!(topic, action = ?event.action, "keyless topic cannot merge; frame dropped");
                        return;
                    }
                }
                let max = self.settings.max_data_length.max(1);
                while items.len() > max {
                    items.pop_front();
                }
            }
            DataSet::Latest(items) => match event.action {
                Action::Update | Action::Delete => {
                    warn!(topic, action = ?event.action, "full-state topic cannot merge; frame dropped");
                }
                _ => *items = event.entries.clone(),
            },
        }
    }

    /// Independent copy of a topic's data set, or `None` if it is not
    /// subscribed. Consume-on-read topics are emptied in the same step.
    pub fn fetch(&self, topic: &str) -> Option<Vec<Value>> {
        let consume = self.consumes_on_read(topic);
        let mut topics = self.lock();
        let set = topics.get_mut(topic)?;
        let copy = set.snapshot();
        if consume {
            set.clear();
        }
        Some(copy)
    }

    pub fn consumes_on_read(&self, topic: &str) -> bool {
        let name = topic_name(topic);
        self.settings
            .consume_on_read
            .get(topic)
            .or_else(|| self.settings.consume_on_read.get(name))
            .copied()
            .unwrap_or_else(|| consumes_on_read_by_default(name))
    }

    /// Empty every data set but keep the topics registered.
    pub fn clear(&self) {
        self.lock().values_mut().for_each(DataSet::clear);
    }

    /// Drop every data set.
    pub fn reset(&self) {
        self.lock().clear();
    }
}

fn apply_keyed(
    topic: &str,
    entries: &mut IndexMap<String, Value>,
    key: String,
    entry: &Value,
    action: Action,
) {
    match action {
        Action::Snapshot => {
            entries.insert(key, entry.clone());
        }
        Action::Insert => {
            if entries.insert(key.clone(), entry.clone()).is_some() {
                warn!(topic, key = %key, "insert for existing key; entry overwritten");
            }
        }
        Action::Update => match entries.get_mut(&key) {
            Some(existing) => merge_fields(existing, entry),
            None => warn!(topic, key = %key, "update for unknown key dropped"),
        },
        Action::Delete => {
            entries.shift_remove(&key);
        }
        Action::Upsert => match entries.get_mut(&key) {
            Some(existing) => merge_fields(existing, entry),
            None => {
                entries.insert(key, entry.clone());
            }
        },
    }
}

fn merge_fields(existing: &mut Value, update: &Value) {
    match (existing, update) {
        (Value::Object(current), Value::Object(fields)) => {
            for (name, value) in fields {
                current.insert(name.clone(), value.clone());
            }
        }
        (existing, update) => *existing = update.clone(),
    }
}
