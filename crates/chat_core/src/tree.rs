//! Message-tree algorithms.
//!
//! All operations take a flat slice of messages and build whatever index they
//! need in one linear pass, then walk by id lookups. Nothing here does I/O or
//! keeps hidden state, so every call is deterministic and restartable.
//! Ordering tie-breaks always use `created_at` ascending; equal timestamps
//! keep input order (the sorts are stable).

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::message::ChatMessage;

fn sort_by_created_at<'a>(mut messages: Vec<&'a ChatMessage>) -> Vec<&'a ChatMessage> {
    messages.sort_by_key(|m| m.created_at);
    messages
}

/// Reconstruct the root-to-leaf chain ending at `leaf_id`.
///
/// Walks parent links from the leaf, guarding against revisiting an id (a
/// cycle cannot occur under the creation invariants, but a corrupt store must
/// not hang the walk). Returns an empty chain when `leaf_id` is absent or the
/// set is empty. Runs in time linear in chain depth after the index build.
pub fn build_chain<'a>(messages: &'a [ChatMessage], leaf_id: Uuid) -> Vec<&'a ChatMessage> {
    if messages.is_empty() {
        return Vec::new();
    }

    let index: HashMap<Uuid, &ChatMessage> = messages.iter().map(|m| (m.id, m)).collect();

    let mut chain: Vec<&ChatMessage> = Vec::new();
    let mut visited: HashSet<Uuid> = HashSet::new();
    let mut current = index.get(&leaf_id).copied();

    while let Some(message) = current {
        if !visited.insert(message.id) {
            break;
        }
        chain.push(message);
        current = message
            .parent_id
            .and_then(|parent_id| index.get(&parent_id).copied());
    }

    chain.reverse();
    chain
}

/// Messages sharing `message_id`'s parent, excluding the message itself,
/// ordered by `created_at` ascending. Empty when the target is absent.
pub fn find_siblings<'a>(messages: &'a [ChatMessage], message_id: Uuid) -> Vec<&'a ChatMessage> {
    let Some(target) = messages.iter().find(|m| m.id == message_id) else {
        return Vec::new();
    };

    let siblings: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| m.parent_id == target.parent_id && m.id != message_id)
        .collect();

    sort_by_created_at(siblings)
}

/// The deterministic default endpoint of the active path.
///
/// A leaf is any message not referenced as a parent. Among leaves (or all
/// messages, when nothing qualifies) the earliest-created one wins, so the
/// default path follows the first-explored branch.
pub fn get_default_leaf(messages: &[ChatMessage]) -> Option<&ChatMessage> {
    if messages.is_empty() {
        return None;
    }

    let parent_ids: HashSet<Uuid> = messages.iter().filter_map(|m| m.parent_id).collect();

    let leaves: Vec<&ChatMessage> = messages
        .iter()
        .filter(|m| !parent_ids.contains(&m.id))
        .collect();

    let candidates = if leaves.is_empty() {
        messages.iter().collect()
    } else {
        leaves
    };

    sort_by_created_at(candidates).first().copied()
}

/// Index children by parent id, each list ordered by `created_at` ascending.
pub fn get_children_map(messages: &[ChatMessage]) -> HashMap<Uuid, Vec<&ChatMessage>> {
    let mut map: HashMap<Uuid, Vec<&ChatMessage>> = HashMap::new();
    for message in messages {
        if let Some(parent_id) = message.parent_id {
            map.entry(parent_id).or_default().push(message);
        }
    }
    for children in map.values_mut() {
        children.sort_by_key(|m| m.created_at);
    }
    map
}

/// From `start_id`, descend to the earliest-created child at every branch
/// point until a childless node is reached. `None` when the start is absent.
pub fn get_default_leaf_from(messages: &[ChatMessage], start_id: Uuid) -> Option<&ChatMessage> {
    let children_map = get_children_map(messages);
    let mut current = messages.iter().find(|m| m.id == start_id)?;

    loop {
        match children_map.get(&current.id).and_then(|c| c.first()) {
            Some(child) => current = child,
            None => return Some(current),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use chrono::{Duration, Utc};

    fn message(topic: Uuid, parent: Option<Uuid>, offset_secs: i64) -> ChatMessage {
        let mut msg = ChatMessage::new(topic, "msg", Role::User, parent);
        msg.created_at = Utc::now() + Duration::seconds(offset_secs);
        msg
    }

    #[test]
    fn build_chain_walks_to_root() {
        let topic = Uuid::new_v4();
        let root = message(topic, None, 0);
        let mid = message(topic, Some(root.id), 1);
        let leaf = message(topic, Some(mid.id), 2);
        let ids = (root.id, mid.id, leaf.id);

        // Input order must not matter.
        let messages = vec![leaf, root, mid];
        let chain = build_chain(&messages, ids.2);
        let chain_ids: Vec<Uuid> = chain.iter().map(|m| m.id).collect();
        assert_eq!(chain_ids, vec![ids.0, ids.1, ids.2]);
        assert_eq!(chain[0].parent_id, None);
    }

    #[test]
    fn build_chain_empty_for_missing_leaf() {
        let topic = Uuid::new_v4();
        let messages = vec![message(topic, None, 0)];
        assert!(build_chain(&messages, Uuid::new_v4()).is_empty());
        assert!(build_chain(&[], Uuid::new_v4()).is_empty());
    }

    #[test]
    fn build_chain_stops_on_cycle() {
        let topic = Uuid::new_v4();
        let mut a = message(topic, None, 0);
        let mut b = message(topic, None, 1);
        a.parent_id = Some(b.id);
        b.parent_id = Some(a.id);
        let a_id = a.id;

        let messages = vec![a, b];
        let chain = build_chain(&messages, a_id);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn default_leaf_prefers_earliest_created() {
        let topic = Uuid::new_v4();
        let root = message(topic, None, 0);
        let early = message(topic, Some(root.id), 1);
        let late = message(topic, Some(root.id), 2);
        let early_id = early.id;

        let messages = vec![late, root, early];
        assert_eq!(get_default_leaf(&messages).unwrap().id, early_id);
        // Idempotent on unchanged input.
        assert_eq!(get_default_leaf(&messages).unwrap().id, early_id);
    }

    #[test]
    fn default_leaf_single_node_topic() {
        let topic = Uuid::new_v4();
        let root = message(topic, None, 0);
        let root_id = root.id;
        assert_eq!(get_default_leaf(&[root]).unwrap().id, root_id);
    }

    #[test]
    fn siblings_exclude_target_and_sort() {
        let topic = Uuid::new_v4();
        let root = message(topic, None, 0);
        let a = message(topic, Some(root.id), 3);
        let b = message(topic, Some(root.id), 1);
        let c = message(topic, Some(root.id), 2);
        let (a_id, b_id, c_id) = (a.id, b.id, c.id);

        let messages = vec![root, a, b, c];
        let siblings: Vec<Uuid> = find_siblings(&messages, a_id).iter().map(|m| m.id).collect();
        assert_eq!(siblings, vec![b_id, c_id]);
    }

    #[test]
    fn siblings_empty_without_peers_or_target() {
        let topic = Uuid::new_v4();
        let root = message(topic, None, 0);
        let only = message(topic, Some(root.id), 1);
        let only_id = only.id;

        let messages = vec![root, only];
        assert!(find_siblings(&messages, only_id).is_empty());
        assert!(find_siblings(&messages, Uuid::new_v4()).is_empty());
    }

    #[test]
    fn children_map_orders_by_created_at() {
        let topic = Uuid::new_v4();
        let root = message(topic, None, 0);
        let late = message(topic, Some(root.id), 5);
        let early = message(topic, Some(root.id), 1);
        let (root_id, early_id, late_id) = (root.id, early.id, late.id);

        let messages = vec![root, late, early];
        let map = get_children_map(&messages);
        let children: Vec<Uuid> = map[&root_id].iter().map(|m| m.id).collect();
        assert_eq!(children, vec![early_id, late_id]);
    }

    #[test]
    fn default_leaf_from_follows_earliest_branch() {
        let topic = Uuid::new_v4();
        let root = message(topic, None, 0);
        let first = message(topic, Some(root.id), 1);
        let second = message(topic, Some(root.id), 2);
        let deep = message(topic, Some(first.id), 3);
        let (root_id, deep_id) = (root.id, deep.id);

        let messages = vec![root, first, second, deep];
        assert_eq!(
            get_default_leaf_from(&messages, root_id).unwrap().id,
            deep_id
        );
        assert!(get_default_leaf_from(&messages, Uuid::new_v4()).is_none());
    }
}
