//! Staging buffer readbacks.
//!
//! The copy into a `MAP_READ` buffer is recorded on the current encoder,
//! which is submitted right away so the mapping can start. The task polls
//! the device until the map callback has fired and then strips the row
//! padding texture copies need.

use std::ops::Range;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::readback::{ReadbackPoll, ReadbackTask};

type MapResult = Arc<Mutex<Option<Result<(), wgpu::BufferAsyncError>>>>;

/// Row layout of a texture copied into a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaddedRows {
    /// Bytes of pixel data per row.
    pub unpadded: u32,
    /// Bytes per row in the staging buffer.
    pub padded: u32,
    pub rows: u32,
}

impl PaddedRows {
    pub fn new(row_bytes: u32, rows: u32) -> Self {
        Self {
            unpadded: row_bytes,
            padded: row_bytes.next_multiple_of(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT),
            rows,
        }
    }

    pub fn buffer_size(&self) -> u64 {
        self.padded as u64 * self.rows as u64
    }

    /// Copies tightly packed rows from `data` into the padded layout of `out`.
    pub fn pad_into(&self, data: &[u8], out: &mut [u8]) {
        let row = self.unpadded as usize;
        for (src, dst) in data
            .chunks(row)
            .zip(out.chunks_mut(self.padded as usize))
            .take(self.rows as usize)
        {
            dst[..src.len()].copy_from_slice(src);
        }
    }

    pub fn strip(&self, data: &[u8]) -> Vec<u8> {
        if self.padded == self.unpadded {
            return data[..self.unpadded as usize * self.rows as usize].to_vec();
        }
        let mut out = Vec::with_capacity(self.unpadded as usize * self.rows as usize);
        for row in data.chunks(self.padded as usize).take(self.rows as usize) {
            out.extend_from_slice(&row[..self.unpadded as usize]);
        }
        out
    }
}

fn swap_red_blue(mut bytes: Vec<u8>) -> Vec<u8> {
    for pixel in bytes.chunks_exact_mut(4) {
        pixel.swap(0, 2);
    }
    bytes
}

pub struct StagingReadback {
    device: wgpu::Device,
    buffer: wgpu::Buffer,
    mapped: MapResult,
    /// Bytes of the staging buffer handed back, for unpadded copies.
    range: Range<u64>,
    rows: Option<PaddedRows>,
    /// Set for BGRA sources whose bytes are handed back as RGBA.
    swap_red_blue: bool,
    done: bool,
}

impl StagingReadback {
    /// Starts mapping `buffer`. The copy into it must already be submitted.
    pub fn start(device: &wgpu::Device, buffer: wgpu::Buffer, range: Range<u64>, rows: Option<PaddedRows>) -> Self {
        let mapped = MapResult::default();
        let slot = Arc::clone(&mapped);
        buffer.slice(..).map_async(wgpu::MapMode::Read, move |result| {
            *slot.lock() = Some(result);
        });
        Self {
            device: device.clone(),
            buffer,
            mapped,
            range,
            rows,
            swap_red_blue: false,
            done: false,
        }
    }

    pub fn with_red_blue_swapped(mut self, swap: bool) -> Self {
        self.swap_red_blue = swap;
        self
    }

    fn read(&self) -> Vec<u8> {
        let data = self.buffer.slice(..).get_mapped_range();
        let bytes = match self.rows {
            Some(rows) => rows.strip(&data),
            None => data[self.range.start as usize..self.range.end as usize].to_vec(),
        };
        drop(data);
        self.buffer.unmap();
        if self.swap_red_blue {
            swap_red_blue(bytes)
        } else {
            bytes
        }
    }
}

impl ReadbackTask for StagingReadback {
    fn poll(&mut self, wait: bool) -> ReadbackPoll {
        if self.done {
            return ReadbackPoll::Pending;
        }

        let poll = if wait {
            wgpu::PollType::Wait {
                submission_index: None,
                timeout: None,
            }
        } else {
            wgpu::PollType::Poll
        };
        if let Err(err) = self.device.poll(poll) {
            self.done = true;
            return ReadbackPoll::Failed(format!("Device poll failed: {}", err));
        }

        let result = self.mapped.lock().take();
        match result {
            None => ReadbackPoll::Pending,
            Some(Ok(())) => {
                self.done = true;
                ReadbackPoll::Ready(self.read())
            }
            Some(Err(err)) => {
                self.done = true;
                ReadbackPoll::Failed(format!("Could not map the readback buffer: {}", err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_are_padded_to_copy_alignment() {
        let rows = PaddedRows::new(10 * 4, 3);
        assert_eq!(rows.padded, 256);
        assert_eq!(rows.buffer_size(), 768);

        let mut data = vec![0u8; 768];
        for row in 0..3 {
            data[row * 256..row * 256 + 40].fill(row as u8 + 1);
        }
        let stripped = rows.strip(&data);
        assert_eq!(stripped.len(), 120);
        assert!(stripped[..40].iter().all(|b| *b == 1));
        assert!(stripped[80..].iter().all(|b| *b == 3));
    }

    #[test]
    fn test_pad_into_leaves_row_tails() {
        let rows = PaddedRows::new(6, 2);
        let mut out = vec![0xAAu8; rows.buffer_size() as usize];
        rows.pad_into(&[1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12], &mut out);
        assert_eq!(&out[..6], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(out[6], 0xAA);
        assert_eq!(&out[256..262], &[7, 8, 9, 10, 11, 12]);
        assert_eq!(rows.strip(&out), (1..=12).collect::<Vec<u8>>());
    }

    #[test]
    fn test_swap_red_blue() {
        assert_eq!(swap_red_blue(vec![1, 2, 3, 4, 5, 6, 7, 8]), vec![3, 2, 1, 4, 7, 6, 5, 8]);
    }

    #[test]
    fn test_aligned_rows_are_copied_verbatim() {
        let rows = PaddedRows::new(256, 2);
        let data: Vec<u8> = (0..512).map(|i| i as u8).collect();
        assert_eq!(rows.strip(&data), data);
    }
}
