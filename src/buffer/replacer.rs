use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::buffer::{AccessType, Replacer};
use crate::error::{Error, Result};
use crate::storage::page::FrameId;

#[derive(Debug, Eq, PartialEq)]
struct KDistance {
    frame_id: FrameId,
    distance: usize,
    oldest_access: usize,
}

impl PartialOrd for KDistance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KDistance {
    fn cmp(&self, other: &Self) -> Ordering {
        // largest distance sorts first; ties go to the earliest access
        match self.distance.cmp(&other.distance).reverse() {
            Ordering::Equal => self.oldest_access.cmp(&other.oldest_access),
            other => other,
        }
    }
}

struct LRUKNode {
    k: usize,
    frame_id: FrameId,
    is_evictable: bool,
    /// history of the last k access timestamps of the frame.
    /// Least recent timestamp stored in front.
    history: VecDeque<usize>,
}

impl LRUKNode {
    fn new(frame_id: FrameId, k: usize) -> Self {
        assert!(k > 0, "replacer k should be larger than zero");
        LRUKNode { history: VecDeque::with_capacity(k), k, frame_id, is_evictable: false }
    }

    fn record_access(&mut self, timestamp: usize) {
        self.history.push_back(timestamp);
        if self.history.len() > self.k {
            self.history.pop_front();
        }
    }

    fn k_distance(&self, now: usize) -> KDistance {
        // a node only exists once it has been accessed, so the history
        // is never empty here.
        let oldest = *self.history.front().unwrap_or(&0);
        if self.history.len() < self.k {
            return KDistance { frame_id: self.frame_id, distance: usize::MAX, oldest_access: oldest };
        }
        KDistance { frame_id: self.frame_id, distance: now - oldest, oldest_access: oldest }
    }
}

/// LRUKReplacer implements the LRU-k replacement policy.
///
/// The LRU-k algorithm evicts the frame whose backward k-distance is
/// maximum over all evictable frames. Backward k-distance is computed
/// as the difference between the current timestamp and the timestamp
/// of the k-th previous access, i.e. the oldest access still in the
/// history.
///
/// A frame with fewer than k recorded accesses is given +inf as its
/// backward k-distance. When multiple frames tie, the frame with the
/// earliest recorded access is the victim.
pub struct LRUKReplacer {
    nodes: HashMap<FrameId, LRUKNode>,
    current_timestamp: usize,
    current_size: usize,
    num_frames: usize,
    k: usize,
}

impl LRUKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        LRUKReplacer { nodes: HashMap::new(), current_timestamp: 0, current_size: 0, num_frames, k }
    }

    /// Record the event that the given frame is accessed at the
    /// current timestamp, creating an access history for frames that
    /// have not been seen before. The access type is reserved for
    /// policy extensions and is not consulted.
    fn record_access(&mut self, frame_id: FrameId, _access_type: AccessType) -> Result<()> {
        if frame_id >= self.num_frames {
            return Err(Error::OutOfRange(format!("frame id {} out of range", frame_id)));
        }
        let k = self.k;
        let node = self.nodes.entry(frame_id).or_insert_with(|| LRUKNode::new(frame_id, k));
        node.record_access(self.current_timestamp);
        self.current_timestamp += 1;
        Ok(())
    }

    /// Find the frame with the largest backward k-distance and evict
    /// it. Only frames marked evictable are candidates. A successful
    /// eviction removes the frame's access history entirely.
    fn evict(&mut self) -> Option<FrameId> {
        let mut distances = Vec::new();
        for node in self.nodes.values() {
            if !node.is_evictable {
                continue;
            }
            distances.push(node.k_distance(self.current_timestamp));
        }
        if distances.is_empty() {
            return None;
        }

        distances.sort();

        // there is always at least one element here, the front is the
        // victim.
        let victim = distances.first().unwrap().frame_id;
        self.nodes.remove(&victim);
        self.current_size -= 1;

        Some(victim)
    }

    /// Toggle whether a frame is evictable or not, keeping the count
    /// of evictable frames in step. Setting the current value again
    /// changes nothing.
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) -> Result<()> {
        if frame_id >= self.num_frames {
            return Err(Error::OutOfRange(format!("frame id {} out of range", frame_id)));
        }
        let node = self
            .nodes
            .get_mut(&frame_id)
            .ok_or_else(|| Error::OutOfRange(format!("frame id {} is not tracked", frame_id)))?;
        if node.is_evictable == evictable {
            return Ok(());
        }
        node.is_evictable = evictable;
        if evictable {
            self.current_size += 1;
        } else {
            self.current_size -= 1;
        }
        Ok(())
    }

    /// Remove the given frame and its history no matter where the
    /// policy ranks it. Unknown frames are left alone; removing a
    /// frame that is not evictable is a caller bug.
    fn remove(&mut self, frame_id: FrameId) -> Result<()> {
        let node = match self.nodes.get(&frame_id) {
            None => return Ok(()),
            Some(node) => node,
        };
        if !node.is_evictable {
            return Err(Error::InvalidState(format!("frame {} is not evictable", frame_id)));
        }
        self.nodes.remove(&frame_id);
        self.current_size -= 1;
        Ok(())
    }

    fn size(&self) -> usize {
        self.current_size
    }
}

/// SyncLRUKReplacer is the thread-safe wrapper around LRUKReplacer;
/// all the heavy lifting happens in the inner replacer.
pub struct SyncLRUKReplacer {
    inner: Mutex<LRUKReplacer>,
}

impl SyncLRUKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        SyncLRUKReplacer { inner: Mutex::new(LRUKReplacer::new(num_frames, k)) }
    }
}

impl Replacer for SyncLRUKReplacer {
    fn record_access(&self, frame_id: FrameId, access_type: AccessType) -> Result<()> {
        self.inner.lock()?.record_access(frame_id, access_type)
    }

    fn evict(&self) -> Option<FrameId> {
        self.inner.lock().ok()?.evict()
    }

    fn set_evictable(&self, frame_id: FrameId, evictable: bool) -> Result<()> {
        self.inner.lock()?.set_evictable(frame_id, evictable)
    }

    fn remove(&self, frame_id: FrameId) -> Result<()> {
        self.inner.lock()?.remove(frame_id)
    }

    fn size(&self) -> usize {
        self.inner.lock().map_or(0, |inner| inner.size())
    }
}
