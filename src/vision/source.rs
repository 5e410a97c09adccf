// Copyright (c) 2026 cueclock project
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/cueclock/cueclock-rs

//! Frame source contract
//!
//! Frame acquisition (camera, video file) lives outside this crate. One
//! shared source is constructed at startup and handed by `Arc` to every
//! consumer; it must tolerate concurrent readers.

use anyhow::Result;
use async_trait::async_trait;

use super::Frame;

/// Supplier of the most recent camera frame.
#[async_trait]
pub trait FrameSource: Send + Sync {
    /// Most recent frame; waits until one is available.
    async fn frame(&self) -> Result<Frame>;

    /// Most recent frame, pre-blurred for detection.
    async fn frame_blurred(&self) -> Result<Frame>;

    /// Whether the source is still producing frames.
    fn is_opened(&self) -> bool;
}
