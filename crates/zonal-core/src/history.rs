//! 撤销历史
//!
//! 每条记录保存一次操作的逆操作。容量固定，满了以后最旧的一条被丢弃，
//! 超出深度的操作不可撤销。

use crate::schema::ZonePatch;
use crate::zone::{ZoneId, ZoneRecord};
use std::collections::VecDeque;

/// 历史记录项：执行它即可撤销对应操作
#[derive(Debug, Clone)]
pub enum HistoryEntry {
    /// 撤销创建 = 删除这些区域
    Created { ids: Vec<ZoneId> },
    /// 撤销更新 = 写回旧值
    Updated { inverse: Vec<ZonePatch> },
    /// 撤销删除 = 以原ID重新创建
    Deleted { snapshots: Vec<ZoneRecord> },
}

impl HistoryEntry {
    pub fn name(&self) -> &'static str {
        match self {
            HistoryEntry::Created { .. } => "create",
            HistoryEntry::Updated { .. } => "update",
            HistoryEntry::Deleted { .. } => "delete",
        }
    }

    /// 涉及的区域数量
    pub fn len(&self) -> usize {
        match self {
            HistoryEntry::Created { ids } => ids.len(),
            HistoryEntry::Updated { inverse } => inverse.len(),
            HistoryEntry::Deleted { snapshots } => snapshots.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 有界撤销栈
#[derive(Debug, Clone)]
pub struct History {
    entries: VecDeque<HistoryEntry>,
    depth: usize,
}

impl History {
    pub fn new(depth: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(depth),
            depth,
        }
    }

    /// 压入记录，返回被挤出的最旧记录
    pub fn push(&mut self, entry: HistoryEntry) -> Option<HistoryEntry> {
        if self.depth == 0 || entry.is_empty() {
            return None;
        }
        let evicted = if self.entries.len() == self.depth {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    pub fn pop(&mut self) -> Option<HistoryEntry> {
        self.entries.pop_back()
    }

    pub fn peek(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    pub fn can_undo(&self) -> bool {
        !self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(10)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created(n: usize) -> HistoryEntry {
        HistoryEntry::Created {
            ids: (0..n).map(|_| ZoneId::random()).collect(),
        }
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut history = History::new(3);
        let first = created(1);
        let first_id = match &first {
            HistoryEntry::Created { ids } => ids[0],
            _ => unreachable!(),
        };

        history.push(first);
        history.push(created(2));
        history.push(created(3));
        let evicted = history.push(created(4)).unwrap();
        assert!(matches!(evicted, HistoryEntry::Created { ref ids } if ids[0] == first_id));
        assert_eq!(history.len(), 3);

        assert_eq!(history.pop().unwrap().len(), 4);
        assert_eq!(history.pop().unwrap().len(), 3);
        assert_eq!(history.pop().unwrap().len(), 2);
        assert!(history.pop().is_none());
    }

    #[test]
    fn test_empty_entries_are_ignored() {
        let mut history = History::default();
        history.push(HistoryEntry::Updated { inverse: vec![] });
        assert!(!history.can_undo());
        assert_eq!(history.depth(), 10);
    }
}
