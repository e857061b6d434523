//! Frame-partitioned streaming storage for batched vertex and index data.
//!
//! A stream buffer is split into one partition per frame in flight. Within
//! a frame, writes only ever move forward through the current partition, so
//! a region handed to a draw is never written again until the partition
//! comes back around, by which point the frame that read it has completed.
//!
//! The CPU-side copy lives here. Backends own a GPU buffer of the same total
//! size and upload each region at the matching offset when it is drawn.

use crate::resource::ResourceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamUsage {
    Vertex,
    Index,
}

/// A range of a stream buffer, in bytes from the start of the whole buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRegion {
    pub offset: usize,
    pub len: usize,
}

#[derive(Debug)]
pub struct StreamBuffer {
    id: ResourceId,
    usage: StreamUsage,
    // Word-sized storage keeps every region 4-byte aligned for `bytemuck` casts.
    data: Vec<u32>,
    partition_size: usize,
    partitions: usize,
    frame: usize,
    used: usize,
    mapped: bool,
}

const ALIGNMENT: usize = 4;

impl StreamBuffer {
    pub fn new(usage: StreamUsage, partition_size: usize, partitions: usize) -> Self {
        let partition_size = partition_size.next_multiple_of(ALIGNMENT).max(ALIGNMENT);
        let partitions = partitions.max(1);
        Self {
            id: ResourceId::next(),
            usage,
            data: vec![0; partition_size * partitions / ALIGNMENT],
            partition_size,
            partitions,
            frame: 0,
            used: 0,
            mapped: false,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn usage(&self) -> StreamUsage {
        self.usage
    }

    /// Size of one frame partition.
    pub fn size(&self) -> usize {
        self.partition_size
    }

    /// Total backing size across all partitions.
    pub fn total_size(&self) -> usize {
        self.partition_size * self.partitions
    }

    /// Bytes still writable in the current frame.
    pub fn usable_size(&self) -> usize {
        self.partition_size - self.used
    }

    pub fn is_mapped(&self) -> bool {
        self.mapped
    }

    fn partition_start(&self) -> usize {
        self.frame * self.partition_size
    }

    /// Absolute offset of the next write.
    pub fn write_offset(&self) -> usize {
        self.partition_start() + self.used
    }

    /// Opens the unused remainder of the current partition for writing and
    /// returns its length.
    pub fn map(&mut self) -> usize {
        self.mapped = true;
        self.usable_size()
    }

    pub fn unmap(&mut self) {
        self.mapped = false;
    }

    /// Mutable view of `len` bytes starting `offset` bytes past the write offset.
    pub fn mapped_slice(&mut self, offset: usize, len: usize) -> &mut [u8] {
        let start = self.write_offset() + offset;
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut self.data);
        &mut bytes[start..start + len]
    }

    /// Space that [`mark_used`](Self::mark_used) takes up for `len` written bytes.
    pub fn consumed_size(&self, len: usize) -> usize {
        len.next_multiple_of(ALIGNMENT)
    }

    /// Marks `len` bytes at the write offset as consumed by a draw.
    pub fn mark_used(&mut self, len: usize) -> StreamRegion {
        let region = StreamRegion {
            offset: self.write_offset(),
            len,
        };
        self.used = (self.used + self.consumed_size(len)).min(self.partition_size);
        region
    }

    pub fn data(&self, region: StreamRegion) -> &[u8] {
        let bytes: &[u8] = bytemuck::cast_slice(&self.data);
        &bytes[region.offset..region.offset + region.len]
    }

    /// Moves to the next frame's partition.
    pub fn next_frame(&mut self) {
        self.frame = (self.frame + 1) % self.partitions;
        self.used = 0;
        self.mapped = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regions_never_overlap_within_frame() {
        let mut buffer = StreamBuffer::new(StreamUsage::Vertex, 64, 2);
        assert_eq!(buffer.map(), 64);
        buffer.mapped_slice(0, 6).copy_from_slice(&[1, 2, 3, 4, 5, 6]);
        buffer.unmap();
        let first = buffer.mark_used(6);
        assert_eq!(first, StreamRegion { offset: 0, len: 6 });
        assert_eq!(buffer.data(first), &[1, 2, 3, 4, 5, 6]);

        let second = buffer.mark_used(8);
        assert_eq!(second.offset, 8);
        assert_eq!(buffer.usable_size(), 48);
    }

    #[test]
    fn test_next_frame_rotates_partitions() {
        let mut buffer = StreamBuffer::new(StreamUsage::Index, 32, 3);
        buffer.mark_used(16);
        buffer.next_frame();
        assert_eq!(buffer.write_offset(), 32);
        assert_eq!(buffer.usable_size(), 32);
        buffer.next_frame();
        buffer.next_frame();
        assert_eq!(buffer.write_offset(), 0);
        assert_eq!(buffer.total_size(), 96);
    }
}
