//! Incremental group-by over a key-sorted stream.
//!
//! Consecutive members sharing a key are folded into one aggregate document
//! `{"<key_field>":"<key>","<members_field>":[m1,m2,...]}`. A group is closed
//! when the key changes; the last group of the stream has no such boundary and
//! is emitted by `flush_final`.
//!
//! With a flush threshold, a group that accumulates that many unflushed members
//! is emitted early as a partial document and keeps accumulating. Successive
//! emissions for one key get increasing `part` numbers so their ids differ.

use serde_json::Value;

use crate::error::OpError;

/// Output field names for aggregate documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLayout {
    pub key_field: String,
    pub members_field: String,
}

impl GroupLayout {
    pub fn new(key_field: impl Into<String>, members_field: impl Into<String>) -> Self {
        Self {
            key_field: key_field.into(),
            members_field: members_field.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupDocument {
    pub key: i64,
    /// 0 for the first emission of a key, then 1, 2, ... after sub-batch flushes.
    pub part: u32,
    /// Members carried by this document.
    pub members: usize,
    /// False for sub-batch flushes of a group that is still open.
    pub complete: bool,
    pub body: String,
}

impl GroupDocument {
    /// Store id: the key for part 0, `key.part` afterwards.
    pub fn id(&self) -> String {
        if self.part == 0 {
            self.key.to_string()
        } else {
            format!("{}.{}", self.key, self.part)
        }
    }
}

#[derive(Debug)]
struct OpenGroup {
    key: i64,
    /// Fragments, each followed by the separator.
    buf: String,
    /// Members in `buf`.
    pending: usize,
    /// Members already emitted by sub-batch flushes.
    flushed: usize,
    next_part: u32,
}

#[derive(Debug, Default)]
enum GroupState {
    #[default]
    Idle,
    Open(OpenGroup),
}

#[derive(Debug)]
pub struct GroupAggregator {
    layout: GroupLayout,
    /// `"<key_field>":` pre-escaped.
    key_prefix: String,
    /// `"<members_field>":[` pre-escaped.
    members_prefix: String,
    separator: String,
    threshold: Option<usize>,
    state: GroupState,
    emitted: u64,
}

impl GroupAggregator {
    pub fn new(layout: GroupLayout, threshold: Option<usize>) -> Result<Self, OpError> {
        if layout.key_field.is_empty() || layout.members_field.is_empty() {
            return Err(OpError::Group("key and members field names are required".into()));
        }
        if layout.key_field == layout.members_field {
            return Err(OpError::Group(format!(
                "key and members field are both '{}'",
                layout.key_field
            )));
        }
        if threshold == Some(0) {
            return Err(OpError::Group("flush threshold must be at least 1".into()));
        }
        Ok(Self {
            key_prefix: format!("{}:", Value::from(layout.key_field.as_str())),
            members_prefix: format!("{}:[", Value::from(layout.members_field.as_str())),
            layout,
            separator: ",".to_string(),
            threshold,
            state: GroupState::Idle,
            emitted: 0,
        })
    }

    pub fn layout(&self) -> &GroupLayout {
        &self.layout
    }

    /// Key of the open group, if any.
    pub fn current_key(&self) -> Option<i64> {
        match &self.state {
            GroupState::Idle => None,
            GroupState::Open(g) => Some(g.key),
        }
    }

    /// Aggregate documents produced so far.
    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Feed one member. Returns a document when a group closes or a sub-batch flush fires.
    pub fn accept(&mut self, key: i64, fragment: &str) -> Option<GroupDocument> {
        match &mut self.state {
            GroupState::Idle => {
                self.state = GroupState::Open(self.open(key, fragment));
                None
            }
            GroupState::Open(g) if g.key == key => {
                g.buf.push_str(fragment);
                g.buf.push_str(&self.separator);
                g.pending += 1;
                if self.threshold.is_some_and(|t| g.pending >= t) {
                    let doc = self.flush_open(false);
                    self.emitted += 1;
                    return doc;
                }
                None
            }
            GroupState::Open(_) => {
                let next = GroupState::Open(self.open(key, fragment));
                let doc = self.close(next);
                if doc.is_some() {
                    self.emitted += 1;
                }
                doc
            }
        }
    }

    /// Emit the group left open at end of stream.
    pub fn flush_final(mut self) -> Option<GroupDocument> {
        self.close(GroupState::Idle)
    }

    fn open(&self, key: i64, fragment: &str) -> OpenGroup {
        let mut buf = String::with_capacity(fragment.len() * 4);
        buf.push_str(fragment);
        buf.push_str(&self.separator);
        OpenGroup {
            key,
            buf,
            pending: 1,
            flushed: 0,
            next_part: 0,
        }
    }

    /// Replace the state with `next`, rendering whatever the old group still holds.
    fn close(&mut self, next: GroupState) -> Option<GroupDocument> {
        match std::mem::replace(&mut self.state, next) {
            GroupState::Open(g) if g.pending > 0 => {
                Some(self.render(g.key, g.next_part, g.pending, &g.buf, true))
            }
            _ => None,
        }
    }

    /// Emit the pending members of the open group and keep it open.
    fn flush_open(&mut self, complete: bool) -> Option<GroupDocument> {
        let GroupState::Open(g) = &mut self.state else {
            return None;
        };
        let (key, part, members) = (g.key, g.next_part, g.pending);
        let buf = std::mem::take(&mut g.buf);
        g.flushed += g.pending;
        g.pending = 0;
        g.next_part += 1;
        tracing::trace!(key, part, flushed = g.flushed, "sub-batch flush");
        Some(self.render(key, part, members, &buf, complete))
    }

    fn render(&self, key: i64, part: u32, members: usize, buf: &str, complete: bool) -> GroupDocument {
        let list = buf.strip_suffix(self.separator.as_str()).unwrap_or(buf);
        let key_json = Value::from(key.to_string());
        let mut body = String::with_capacity(
            self.key_prefix.len() + self.members_prefix.len() + list.len() + 32,
        );
        body.push('{');
        body.push_str(&self.key_prefix);
        body.push_str(&key_json.to_string());
        body.push(',');
        body.push_str(&self.members_prefix);
        body.push_str(list);
        body.push_str("]}");
        GroupDocument {
            key,
            part,
            members,
            complete,
            body,
        }
    }
}
