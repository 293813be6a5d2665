use crate::object::types::{CallId, CallResponse};
use std::collections::{HashMap, VecDeque};

/// Bounded record of recently applied calls for one object.
///
/// Keeps insertion order so the oldest recorded response is dropped first once
/// the window is full. Mutated only under the object's write lock, so no
/// internal synchronization is needed.
pub struct DedupWindow {
    capacity: usize,
    responses: HashMap<CallId, CallResponse>,
    order: VecDeque<CallId>,
}

impl DedupWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            responses: HashMap::new(),
            order: VecDeque::new(),
        }
    }

    pub fn lookup(&self, call_id: &CallId) -> Option<&CallResponse> {
        self.responses.get(call_id)
    }

    pub fn record(&mut self, response: CallResponse) {
        if self.capacity == 0 || self.responses.contains_key(&response.call_id) {
            return;
        }

        if self.order.len() >= self.capacity
            && let Some(oldest) = self.order.pop_front()
        {
            self.responses.remove(&oldest);
        }

        self.order.push_back(response.call_id.clone());
        self.responses.insert(response.call_id.clone(), response);
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}
