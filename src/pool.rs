// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Per-role frame pools.
//!
//! A slot keeps its frame alive from submission until the hardware has
//! finished with it. Slots are recycled, never freed, so a steady stream
//! stops allocating once the pipeline is full.

use crate::{device::RgaInfo, frame::Frame};
use std::sync::Arc;

/// Which side of an operation a frame plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameRole {
    Source,
    Destination,
    /// Overlay input, or the canvas produced by the pre-composite step.
    Pattern,
    /// Overlay input consumed by the pre-composite step.
    PatternPreprocessed,
}

/// Index of a slot within one [`FramePool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId(usize);

#[derive(Debug, Default)]
pub struct FrameSlot {
    frame: Option<Arc<Frame>>,
    info: RgaInfo,
    queued: bool,
    locked: bool,
}

impl FrameSlot {
    pub fn frame(&self) -> Option<&Arc<Frame>> {
        self.frame.as_ref()
    }

    pub fn info(&self) -> &RgaInfo {
        &self.info
    }

    pub fn is_queued(&self) -> bool {
        self.queued
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

/// Slots for one role.
///
/// `SlotId`s are only handed out by [`FramePool::acquire`] and stay valid
/// until [`FramePool::clear`]; indexing with a foreign id panics.
#[derive(Debug)]
pub struct FramePool {
    role: FrameRole,
    slots: Vec<FrameSlot>,
}

impl FramePool {
    pub fn new(role: FrameRole) -> Self {
        Self {
            role,
            slots: Vec::new(),
        }
    }

    pub fn role(&self) -> FrameRole {
        self.role
    }

    /// Drops the frames of slots no in-flight operation references.
    pub fn recycle(&mut self) {
        for slot in self.slots.iter_mut().filter(|s| s.queued && !s.locked) {
            slot.frame = None;
            slot.queued = false;
        }
    }

    /// Claims a free slot, growing the pool when none is free.
    pub fn acquire(&mut self) -> SlotId {
        let index = match self.slots.iter().position(|s| !s.queued) {
            Some(index) => index,
            None => {
                self.slots.push(FrameSlot::default());
                self.slots.len() - 1
            }
        };
        let slot = &mut self.slots[index];
        slot.queued = true;
        slot.locked = false;
        slot.info = RgaInfo::default();
        SlotId(index)
    }

    /// Fills an acquired slot.
    pub fn attach(&mut self, id: SlotId, frame: Arc<Frame>, info: RgaInfo) {
        let slot = &mut self.slots[id.0];
        slot.frame = Some(frame);
        slot.info = info;
    }

    /// Returns a slot to the free list immediately.
    pub fn release(&mut self, id: SlotId) {
        let slot = &mut self.slots[id.0];
        slot.frame = None;
        slot.queued = false;
        slot.locked = false;
    }

    pub fn slot(&self, id: SlotId) -> &FrameSlot {
        &self.slots[id.0]
    }

    pub fn info(&self, id: SlotId) -> &RgaInfo {
        &self.slots[id.0].info
    }

    pub fn info_mut(&mut self, id: SlotId) -> &mut RgaInfo {
        &mut self.slots[id.0].info
    }

    pub fn frame(&self, id: SlotId) -> Option<&Arc<Frame>> {
        self.slots[id.0].frame.as_ref()
    }

    /// Hands the slot's frame reference out; the slot itself stays queued
    /// until the next recycle.
    pub fn take_frame(&mut self, id: SlotId) -> Option<Arc<Frame>> {
        self.slots[id.0].frame.take()
    }

    pub fn set_locked(&mut self, id: SlotId, locked: bool) {
        self.slots[id.0].locked = locked;
    }

    /// Total slots, free or not.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Slots currently queued.
    pub fn in_use(&self) -> usize {
        self.slots.iter().filter(|s| s.queued).count()
    }

    /// Slots pinned by in-flight operations.
    pub fn locked(&self) -> usize {
        self.slots.iter().filter(|s| s.locked).count()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// The four pools a context owns.
#[derive(Debug)]
pub struct FramePools {
    pub source: FramePool,
    pub destination: FramePool,
    pub pattern: FramePool,
    pub pattern_preprocessed: FramePool,
}

impl Default for FramePools {
    fn default() -> Self {
        Self::new()
    }
}

impl FramePools {
    pub fn new() -> Self {
        Self {
            source: FramePool::new(FrameRole::Source),
            destination: FramePool::new(FrameRole::Destination),
            pattern: FramePool::new(FrameRole::Pattern),
            pattern_preprocessed: FramePool::new(FrameRole::PatternPreprocessed),
        }
    }

    pub fn get(&self, role: FrameRole) -> &FramePool {
        match role {
            FrameRole::Source => &self.source,
            FrameRole::Destination => &self.destination,
            FrameRole::Pattern => &self.pattern,
            FrameRole::PatternPreprocessed => &self.pattern_preprocessed,
        }
    }

    pub fn get_mut(&mut self, role: FrameRole) -> &mut FramePool {
        match role {
            FrameRole::Source => &mut self.source,
            FrameRole::Destination => &mut self.destination,
            FrameRole::Pattern => &mut self.pattern,
            FrameRole::PatternPreprocessed => &mut self.pattern_preprocessed,
        }
    }

    pub fn clear(&mut self) {
        self.source.clear();
        self.destination.clear();
        self.pattern.clear();
        self.pattern_preprocessed.clear();
    }
}
