//! Deterministic CPU profiler: call-tree aggregation under trace events.
//!
//! A [`Profile`] accumulates one node per distinct call path, keyed by
//! [`CallInfo`]. Nodes live in an index arena; `path` tracks the indices of
//! calls not yet matched by a return. Finalization renders the
//! Chrome-compatible tree with per-node cumulative and self timings.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use crate::protocol::{line_to_wire, CpuProfile, ProfileHeader, ProfileNode};
use crate::sync::lock;
use crate::tracing::frame::CallInfo;

/// Module prefix of the agent itself; its frames are never recorded.
const OWN_MODULE_PREFIX: &str = "chromedebug";

/// One aggregated call target within a profile.
#[derive(Clone, Debug)]
struct TraceNode {
    /// Wire id; the synthetic root is 1, children count up from 2.
    id: u32,
    info: CallInfo,
    children: Vec<usize>,
    total_time: f64,
    start_time: f64,
    num_calls: u32,
    in_call: bool,
}

/// A single recording session.
#[derive(Debug)]
pub struct Profile {
    uid: u64,
    title: String,
    epoch: Instant,
    start_time: f64,
    duration: Option<f64>,
    nodes: Vec<TraceNode>,
    root_children: Vec<usize>,
    path: Vec<usize>,
    samples: Vec<u32>,
    next_id: u32,
}

impl Profile {
    fn new(uid: u64, title: String) -> Self {
        Self {
            uid,
            title,
            epoch: Instant::now(),
            start_time: 0.0,
            duration: None,
            nodes: Vec::new(),
            root_children: Vec::new(),
            path: Vec::new(),
            samples: Vec::new(),
            next_id: 1,
        }
    }

    /// Milliseconds since the profile started.
    fn timestamp(&self) -> f64 {
        self.epoch.elapsed().as_secs_f64() * 1000.0
    }

    fn generate_id(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Locates the child of `parent` (or of the root when `None`) keyed by
    /// `info`, creating it on first sight.
    fn child_for(&mut self, parent: Option<usize>, info: &CallInfo) -> usize {
        let siblings = match parent {
            Some(idx) => &self.nodes[idx].children,
            None => &self.root_children,
        };
        if let Some(&idx) = siblings.iter().find(|&&i| self.nodes[i].info == *info) {
            return idx;
        }
        let id = self.generate_id();
        let idx = self.nodes.len();
        self.nodes.push(TraceNode {
            id,
            info: info.clone(),
            children: Vec::new(),
            total_time: 0.0,
            start_time: 0.0,
            num_calls: 0,
            in_call: false,
        });
        match parent {
            Some(p) => self.nodes[p].children.push(idx),
            None => self.root_children.push(idx),
        }
        idx
    }

    /// Records a `call` event.
    pub(crate) fn trace_call(&mut self, info: &CallInfo) {
        let now = self.timestamp();
        let idx = self.child_for(self.path.last().copied(), info);
        self.samples.push(self.nodes[idx].id);
        let node = &mut self.nodes[idx];
        node.num_calls += 1;
        node.in_call = true;
        node.start_time = now;
        self.path.push(idx);
    }

    /// Records a `return` event: closes the innermost open call, if any.
    pub(crate) fn trace_return(&mut self) {
        let now = self.timestamp();
        if let Some(idx) = self.path.pop() {
            let node = &mut self.nodes[idx];
            node.total_time += now - node.start_time;
            node.in_call = false;
        }
    }

    /// The wire header identifying this profile.
    pub fn header(&self) -> ProfileHeader {
        ProfileHeader { type_id: "CPU".to_string(), uid: self.uid, title: self.title.clone() }
    }

    /// Stamps the duration at the end of the recording.
    fn stop(&mut self) {
        if self.duration.is_none() {
            self.duration = Some(self.timestamp() - self.start_time);
        }
    }

    fn encode_node(&self, idx: usize) -> ProfileNode {
        let node = &self.nodes[idx];
        let children: Vec<ProfileNode> =
            node.children.iter().map(|&c| self.encode_node(c)).collect();
        let children_total: f64 = children.iter().map(|c| c.total_time).sum();
        let mut function_name = node.info.function.clone();
        if node.in_call {
            function_name.push_str(" (did not return)");
        }
        ProfileNode {
            function_name,
            url: node.info.module.clone(),
            line_number: line_to_wire(node.info.line),
            total_time: node.total_time,
            self_time: node.total_time - children_total,
            number_of_calls: node.num_calls,
            visible: true,
            call_uid: call_uid(&node.info),
            children,
            id: node.id,
        }
    }

    /// Renders the finalized tree.
    pub fn profile(&mut self) -> CpuProfile {
        self.stop();
        let duration = self.duration.unwrap_or_default();
        let children: Vec<ProfileNode> =
            self.root_children.iter().map(|&c| self.encode_node(c)).collect();
        let children_total: f64 = children.iter().map(|c| c.total_time).sum();
        let head = ProfileNode {
            function_name: "(root)".to_string(),
            url: String::new(),
            line_number: 0,
            total_time: duration,
            self_time: 0.0,
            number_of_calls: 0,
            visible: true,
            call_uid: 0,
            children,
            id: 1,
        };
        CpuProfile {
            head,
            idle_time: duration - children_total,
            samples: self.samples.clone(),
        }
    }
}

fn call_uid(info: &CallInfo) -> u64 {
    let mut hasher = DefaultHasher::new();
    info.hash(&mut hasher);
    hasher.finish()
}

/// Process-wide list of recorded profiles plus the one currently recording.
#[derive(Debug, Default)]
pub struct ProfileRegistry {
    profiles: Mutex<Vec<Arc<Mutex<Profile>>>>,
    current: Mutex<Option<Arc<Mutex<Profile>>>>,
    next_uid: Mutex<u64>,
}

impl ProfileRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts recording. The new profile becomes the target of trace
    /// events until [`Self::stop`].
    pub fn start(&self, title: Option<&str>) -> ProfileHeader {
        let uid = {
            let mut next = lock(&self.next_uid);
            *next += 1;
            *next
        };
        let title = match title {
            Some(t) => t.to_string(),
            None => format!("Profile {uid}"),
        };
        let profile = Arc::new(Mutex::new(Profile::new(uid, title)));
        let header = lock(&profile).header();
        lock(&self.profiles).push(profile.clone());
        *lock(&self.current) = Some(profile);
        header
    }

    /// Stops the in-flight recording and returns its header.
    pub fn stop(&self) -> Option<ProfileHeader> {
        let profile = lock(&self.current).take()?;
        let mut profile = lock(&profile);
        profile.stop();
        Some(profile.header())
    }

    /// The finalized tree for `uid`, if such a profile was recorded.
    pub fn profile(&self, uid: u64) -> Option<CpuProfile> {
        let profiles = lock(&self.profiles);
        let found = profiles.iter().find(|p| lock(p).uid == uid)?.clone();
        drop(profiles);
        let result = lock(&found).profile();
        Some(result)
    }

    /// Headers of every finished profile; the in-flight one is excluded.
    pub fn headers(&self) -> Vec<ProfileHeader> {
        let current = lock(&self.current).clone();
        lock(&self.profiles)
            .iter()
            .filter(|p| match &current {
                Some(c) => !Arc::ptr_eq(p, c),
                None => true,
            })
            .map(|p| lock(p).header())
            .collect()
    }

    /// True while a recording is in flight.
    pub fn is_recording(&self) -> bool {
        lock(&self.current).is_some()
    }

    /// Feeds a `call` event into the in-flight recording.
    pub(crate) fn record_call(&self, info: &CallInfo) {
        if info.module.starts_with(OWN_MODULE_PREFIX) {
            return;
        }
        if let Some(profile) = lock(&self.current).clone() {
            lock(&profile).trace_call(info);
        }
    }

    /// Feeds a `return` event into the in-flight recording.
    pub(crate) fn record_return(&self) {
        if let Some(profile) = lock(&self.current).clone() {
            lock(&profile).trace_return();
        }
    }
}
