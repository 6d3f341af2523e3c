//! Region-addressed access to raw sidecar payloads.
//!
//! Payloads are flat row-major sample arrays in big-endian byte order with
//! no header, so sample `(x, y)` of a `width`-wide node starts at byte
//! `(y * width + x) * sample_size`. Each open file sits behind its own lock:
//! requests on different files proceed in parallel while requests on the
//! same file serialise.

use crate::core::product::{Product, SidecarState};
use crate::core::progress::ProgressMonitor;
use crate::types::{DataType, DimapError, DimapResult, RasterNodeId};
use ndarray::Array2;
use num_traits::{NumCast, ToPrimitive};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Sample types storable in a sidecar
pub trait Sample: Copy + Default + NumCast + ToPrimitive + Send + Sync + 'static {
    const SIZE: usize;
    fn write_be(&self, out: &mut Vec<u8>);
    fn read_be(bytes: &[u8]) -> Self;
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(
            impl Sample for $t {
                const SIZE: usize = std::mem::size_of::<$t>();

                fn write_be(&self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_be_bytes());
                }

                fn read_be(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$t>()];
                    raw.copy_from_slice(&bytes[..Self::SIZE]);
                    <$t>::from_be_bytes(raw)
                }
            }
        )*
    };
}

impl_sample!(i8, u8, i16, u16, i32, u32, f32, f64);

/// Typed sample buffer of a region
#[derive(Debug, Clone, PartialEq)]
pub enum RasterBuffer {
    Int8(Vec<i8>),
    UInt8(Vec<u8>),
    Int16(Vec<i16>),
    UInt16(Vec<u16>),
    Int32(Vec<i32>),
    UInt32(Vec<u32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
}

macro_rules! dispatch {
    ($buffer:expr, $v:ident => $body:expr) => {
        match $buffer {
            RasterBuffer::Int8($v) => $body,
            RasterBuffer::UInt8($v) => $body,
            RasterBuffer::Int16($v) => $body,
            RasterBuffer::UInt16($v) => $body,
            RasterBuffer::Int32($v) => $body,
            RasterBuffer::UInt32($v) => $body,
            RasterBuffer::Float32($v) => $body,
            RasterBuffer::Float64($v) => $body,
        }
    };
}

fn cast_all<T: Sample>(values: &[f64]) -> Vec<T> {
    values
        .iter()
        .map(|v| <T as NumCast>::from(*v).unwrap_or_default())
        .collect()
}

fn decode_all<T: Sample>(bytes: &[u8]) -> Vec<T> {
    bytes.chunks_exact(T::SIZE).map(T::read_be).collect()
}

impl RasterBuffer {
    pub fn zeros(data_type: DataType, len: usize) -> Self {
        match data_type {
            DataType::Int8 => RasterBuffer::Int8(vec![0; len]),
            DataType::UInt8 => RasterBuffer::UInt8(vec![0; len]),
            DataType::Int16 => RasterBuffer::Int16(vec![0; len]),
            DataType::UInt16 => RasterBuffer::UInt16(vec![0; len]),
            DataType::Int32 => RasterBuffer::Int32(vec![0; len]),
            DataType::UInt32 => RasterBuffer::UInt32(vec![0; len]),
            DataType::Float32 => RasterBuffer::Float32(vec![0.0; len]),
            DataType::Float64 => RasterBuffer::Float64(vec![0.0; len]),
        }
    }

    /// Convert `values` to the given sample type; out-of-range values
    /// become zero
    pub fn from_f64(data_type: DataType, values: &[f64]) -> Self {
        match data_type {
            DataType::Int8 => RasterBuffer::Int8(cast_all(values)),
            DataType::UInt8 => RasterBuffer::UInt8(cast_all(values)),
            DataType::Int16 => RasterBuffer::Int16(cast_all(values)),
            DataType::UInt16 => RasterBuffer::UInt16(cast_all(values)),
            DataType::Int32 => RasterBuffer::Int32(cast_all(values)),
            DataType::UInt32 => RasterBuffer::UInt32(cast_all(values)),
            DataType::Float32 => RasterBuffer::Float32(cast_all(values)),
            DataType::Float64 => RasterBuffer::Float64(values.to_vec()),
        }
    }

    fn from_be_bytes(data_type: DataType, bytes: &[u8]) -> Self {
        match data_type {
            DataType::Int8 => RasterBuffer::Int8(decode_all(bytes)),
            DataType::UInt8 => RasterBuffer::UInt8(bytes.to_vec()),
            DataType::Int16 => RasterBuffer::Int16(decode_all(bytes)),
            DataType::UInt16 => RasterBuffer::UInt16(decode_all(bytes)),
            DataType::Int32 => RasterBuffer::Int32(decode_all(bytes)),
            DataType::UInt32 => RasterBuffer::UInt32(decode_all(bytes)),
            DataType::Float32 => RasterBuffer::Float32(decode_all(bytes)),
            DataType::Float64 => RasterBuffer::Float64(decode_all(bytes)),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            RasterBuffer::Int8(_) => DataType::Int8,
            RasterBuffer::UInt8(_) => DataType::UInt8,
            RasterBuffer::Int16(_) => DataType::Int16,
            RasterBuffer::UInt16(_) => DataType::UInt16,
            RasterBuffer::Int32(_) => DataType::Int32,
            RasterBuffer::UInt32(_) => DataType::UInt32,
            RasterBuffer::Float32(_) => DataType::Float32,
            RasterBuffer::Float64(_) => DataType::Float64,
        }
    }

    pub fn len(&self) -> usize {
        dispatch!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get_f64(&self, index: usize) -> Option<f64> {
        dispatch!(self, v => v.get(index).and_then(|s| s.to_f64()))
    }

    pub fn to_f64_vec(&self) -> Vec<f64> {
        dispatch!(self, v => v.iter().map(|s| s.to_f64().unwrap_or(f64::NAN)).collect())
    }

    /// Values as a `height` x `width` array
    pub fn to_array2(&self, width: usize, height: usize) -> DimapResult<Array2<f64>> {
        Array2::from_shape_vec((height, width), self.to_f64_vec())
            .map_err(|e| DimapError::Format(format!("buffer does not fit {}x{}: {}", width, height, e)))
    }

    /// Big-endian bytes of the samples in `range`
    fn encode_range(&self, range: std::ops::Range<usize>) -> Vec<u8> {
        let mut out = Vec::with_capacity(range.len() * self.data_type().size());
        dispatch!(self, v => {
            for s in &v[range] {
                s.write_be(&mut out);
            }
        });
        out
    }
}

/// Geometry and payload location of one raster node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeLayout {
    pub width: usize,
    pub height: usize,
    pub data_type: DataType,
    pub sidecar: SidecarState,
}

impl NodeLayout {
    fn byte_len(&self) -> DimapResult<u64> {
        payload_len(self.width, self.height, self.data_type)
    }
}

/// Byte length of a `width` x `height` payload of `data_type`
pub(crate) fn payload_len(width: usize, height: usize, data_type: DataType) -> DimapResult<u64> {
    width
        .checked_mul(height)
        .and_then(|n| n.checked_mul(data_type.size()))
        .and_then(|n| u64::try_from(n).ok())
        .ok_or_else(|| {
            DimapError::Format(format!("{}x{} {} raster is too large", width, height, data_type))
        })
}

/// Missing, unreadable and short sidecars all mean the payload is unavailable
fn sidecar_error(node: &RasterNodeId, path: &Path, err: std::io::Error) -> DimapError {
    match err.kind() {
        ErrorKind::NotFound | ErrorKind::PermissionDenied | ErrorKind::UnexpectedEof => {
            DimapError::DataUnavailable(format!(
                "sidecar of {} unavailable ({}): {}",
                node,
                path.display(),
                err
            ))
        }
        _ => DimapError::Io(err),
    }
}

type SharedFile = Arc<Mutex<File>>;

fn lock_error() -> DimapError {
    DimapError::Io(std::io::Error::new(
        std::io::ErrorKind::Other,
        "sidecar lock poisoned",
    ))
}

/// Region reads and writes over the sidecar files of one product
#[derive(Debug, Default)]
pub struct RasterIo {
    nodes: HashMap<RasterNodeId, NodeLayout>,
    handles: Mutex<HashMap<PathBuf, SharedFile>>,
    writable: bool,
}

impl RasterIo {
    /// Read-only access to the nodes of `product` as currently bound
    pub fn for_product(product: &Product) -> Self {
        let mut io = Self::default();
        for band in product.bands().iter().filter(|b| b.is_stored()) {
            io.register(
                RasterNodeId::Band(band.name.clone()),
                NodeLayout {
                    width: band.width,
                    height: band.height,
                    data_type: band.data_type,
                    sidecar: band.sidecar.clone(),
                },
            );
        }
        for grid in product.tie_point_grids() {
            io.register(
                RasterNodeId::TiePointGrid(grid.name.clone()),
                NodeLayout {
                    width: grid.grid_width,
                    height: grid.grid_height,
                    data_type: grid.data_type,
                    sidecar: grid.sidecar.clone(),
                },
            );
        }
        io
    }

    /// Read-write access; files are created on first use
    pub fn writable() -> Self {
        Self {
            writable: true,
            ..Self::default()
        }
    }

    pub fn register(&mut self, node: RasterNodeId, layout: NodeLayout) {
        self.nodes.insert(node, layout);
    }

    pub fn layout(&self, node: &RasterNodeId) -> Option<&NodeLayout> {
        self.nodes.get(node)
    }

    /// Drop all open file handles
    pub fn close(&self) -> DimapResult<()> {
        let mut handles = self.handles.lock().map_err(|_| lock_error())?;
        log::debug!("Closing {} sidecar handle(s)", handles.len());
        handles.clear();
        Ok(())
    }

    fn bound_layout(&self, node: &RasterNodeId) -> DimapResult<(&NodeLayout, &Path)> {
        let layout = self
            .nodes
            .get(node)
            .ok_or_else(|| DimapError::Format(format!("{} has no payload", node)))?;
        match &layout.sidecar {
            SidecarState::Bound(path) => Ok((layout, path.as_path())),
            SidecarState::Unreadable(path) => Err(DimapError::DataUnavailable(format!(
                "sidecar of {} is unreadable: {}",
                node,
                path.display()
            ))),
            SidecarState::Unbound => Err(DimapError::DataUnavailable(format!(
                "{} is not bound to a sidecar file",
                node
            ))),
        }
    }

    fn handle(&self, node: &RasterNodeId, path: &Path) -> DimapResult<SharedFile> {
        let mut handles = self.handles.lock().map_err(|_| lock_error())?;
        if let Some(file) = handles.get(path) {
            return Ok(Arc::clone(file));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(self.writable)
            .create(self.writable)
            .open(path)
            .map_err(|e| sidecar_error(node, path, e))?;
        let shared = Arc::new(Mutex::new(file));
        handles.insert(path.to_path_buf(), Arc::clone(&shared));
        Ok(shared)
    }

    /// Create or resize the node's file to its full payload length
    pub fn allocate(&self, node: &RasterNodeId) -> DimapResult<()> {
        let (layout, path) = self.bound_layout(node)?;
        if !self.writable {
            return Err(DimapError::Format("raster access is read-only".to_string()));
        }
        let len = layout.byte_len()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = self.handle(node, path)?;
        let file = file.lock().map_err(|_| lock_error())?;
        file.set_len(len)?;
        Ok(())
    }

    /// Read a `w` x `h` region at (`x`, `y`), taking every `step_x`-th
    /// column and `step_y`-th row. The result holds
    /// `ceil(w / step_x) * ceil(h / step_y)` samples in row-major order.
    #[allow(clippy::too_many_arguments)]
    pub fn read_region(
        &self,
        node: &RasterNodeId,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        step_x: usize,
        step_y: usize,
        monitor: &ProgressMonitor,
    ) -> DimapResult<RasterBuffer> {
        let (layout, path) = self.bound_layout(node)?;
        check_region(node, layout, x, y, w, h)?;
        if step_x == 0 || step_y == 0 {
            return Err(DimapError::Format(format!(
                "invalid sub-sampling {}x{} for {}",
                step_x, step_y, node
            )));
        }

        let size = layout.data_type.size();
        let out_w = w.div_ceil(step_x);
        let out_h = h.div_ceil(step_y);
        let mut bytes = Vec::with_capacity(out_w * out_h * size);
        let mut run = vec![0u8; w * size];
        let mut sample = vec![0u8; size];

        let unavailable = |e: std::io::Error| sidecar_error(node, path, e);
        let file = self.handle(node, path)?;
        let mut file = file.lock().map_err(|_| lock_error())?;
        for row in (y..y + h).step_by(step_y) {
            monitor.check()?;
            let row_start = ((row * layout.width + x) * size) as u64;
            if step_x == 1 {
                file.seek(SeekFrom::Start(row_start)).map_err(unavailable)?;
                file.read_exact(&mut run).map_err(unavailable)?;
                bytes.extend_from_slice(&run);
            } else {
                for col in (0..w).step_by(step_x) {
                    file.seek(SeekFrom::Start(row_start + (col * size) as u64))
                        .map_err(unavailable)?;
                    file.read_exact(&mut sample).map_err(unavailable)?;
                    bytes.extend_from_slice(&sample);
                }
            }
            monitor.worked(1);
        }
        Ok(RasterBuffer::from_be_bytes(layout.data_type, &bytes))
    }

    /// Whole payload of a node
    pub fn read_all(&self, node: &RasterNodeId, monitor: &ProgressMonitor) -> DimapResult<RasterBuffer> {
        let (width, height) = self
            .nodes
            .get(node)
            .map(|l| (l.width, l.height))
            .ok_or_else(|| DimapError::Format(format!("{} has no payload", node)))?;
        self.read_region(node, 0, 0, width, height, 1, 1, monitor)
    }

    /// Write `buffer` into a `w` x `h` region at (`x`, `y`)
    #[allow(clippy::too_many_arguments)]
    pub fn write_region(
        &self,
        node: &RasterNodeId,
        x: usize,
        y: usize,
        w: usize,
        h: usize,
        buffer: &RasterBuffer,
        monitor: &ProgressMonitor,
    ) -> DimapResult<()> {
        let (layout, path) = self.bound_layout(node)?;
        if !self.writable {
            return Err(DimapError::Format("raster access is read-only".to_string()));
        }
        check_region(node, layout, x, y, w, h)?;
        if buffer.len() != w * h {
            return Err(DimapError::Format(format!(
                "buffer holds {} samples, region {}x{} needs {}",
                buffer.len(),
                w,
                h,
                w * h
            )));
        }
        if buffer.data_type() != layout.data_type {
            return Err(DimapError::Format(format!(
                "{} buffer cannot be written to {} {}",
                buffer.data_type(),
                layout.data_type,
                node
            )));
        }

        let size = layout.data_type.size();
        let file = self.handle(node, path)?;
        let mut file = file.lock().map_err(|_| lock_error())?;
        for (i, row) in (y..y + h).enumerate() {
            monitor.check()?;
            let bytes = buffer.encode_range(i * w..(i + 1) * w);
            file.seek(SeekFrom::Start(((row * layout.width + x) * size) as u64))?;
            file.write_all(&bytes)?;
            monitor.worked(1);
        }
        file.flush()?;
        Ok(())
    }
}

fn check_region(node: &RasterNodeId, layout: &NodeLayout, x: usize, y: usize, w: usize, h: usize) -> DimapResult<()> {
    layout.byte_len()?;
    let fits = |start: usize, len: usize, extent: usize| start.checked_add(len).map_or(false, |end| end <= extent);
    if w == 0 || h == 0 || !fits(x, w, layout.width) || !fits(y, h, layout.height) {
        return Err(DimapError::Format(format!(
            "region ({}, {}, {}x{}) outside {} of {}x{}",
            x, y, w, h, node, layout.width, layout.height
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn grid_node(dir: &Path, data_type: DataType) -> (RasterIo, RasterNodeId) {
        let node = RasterNodeId::Band("b".to_string());
        let mut io = RasterIo::writable();
        io.register(
            node.clone(),
            NodeLayout {
                width: 10,
                height: 10,
                data_type,
                sidecar: SidecarState::Bound(dir.join("b.img")),
            },
        );
        (io, node)
    }

    #[test]
    fn test_partial_region_read() {
        let dir = TempDir::new().unwrap();
        let (io, node) = grid_node(dir.path(), DataType::Int32);
        let pm = ProgressMonitor::new();
        let values: Vec<f64> = (0..100).map(|i| ((i / 10) * 10 + i % 10) as f64).collect();
        io.allocate(&node).unwrap();
        io.write_region(&node, 0, 0, 10, 10, &RasterBuffer::from_f64(DataType::Int32, &values), &pm)
            .unwrap();

        let region = io.read_region(&node, 2, 3, 4, 2, 1, 1, &pm).unwrap();
        assert_eq!(region, RasterBuffer::Int32(vec![32, 33, 34, 35, 42, 43, 44, 45]));

        let strided = io.read_region(&node, 1, 1, 5, 3, 2, 2, &pm).unwrap();
        assert_eq!(strided, RasterBuffer::Int32(vec![11, 13, 15, 31, 33, 35]));
    }

    #[test]
    fn test_big_endian_layout() {
        let dir = TempDir::new().unwrap();
        let (io, node) = grid_node(dir.path(), DataType::UInt16);
        io.allocate(&node).unwrap();
        io.write_region(&node, 0, 0, 1, 1, &RasterBuffer::UInt16(vec![0x0102]), &ProgressMonitor::new())
            .unwrap();
        io.close().unwrap();
        let bytes = std::fs::read(dir.path().join("b.img")).unwrap();
        assert_eq!(bytes.len(), 200);
        assert_eq!(&bytes[..2], &[0x01, 0x02]);
    }

    #[test]
    fn test_invalid_requests() {
        let dir = TempDir::new().unwrap();
        let (io, node) = grid_node(dir.path(), DataType::Float32);
        io.allocate(&node).unwrap();
        let pm = ProgressMonitor::new();
        assert!(matches!(io.read_region(&node, 8, 0, 3, 1, 1, 1, &pm), Err(DimapError::Format(_))));
        assert!(matches!(io.read_region(&node, 0, 0, 3, 1, 0, 1, &pm), Err(DimapError::Format(_))));
        let short = RasterBuffer::Float32(vec![1.0; 3]);
        assert!(matches!(io.write_region(&node, 0, 0, 2, 2, &short, &pm), Err(DimapError::Format(_))));

        pm.cancel();
        assert!(matches!(io.read_region(&node, 0, 0, 2, 2, 1, 1, &pm), Err(DimapError::UserCancelled)));
    }

    #[test]
    fn test_overflowing_requests_rejected() {
        let dir = TempDir::new().unwrap();
        let (io, node) = grid_node(dir.path(), DataType::Int16);
        io.allocate(&node).unwrap();
        let pm = ProgressMonitor::new();

        assert!(matches!(io.read_region(&node, usize::MAX, 0, 1, 1, 1, 1, &pm), Err(DimapError::Format(_))));
        assert!(matches!(io.read_region(&node, 0, usize::MAX, 1, 1, 1, 1, &pm), Err(DimapError::Format(_))));
        assert!(matches!(io.read_region(&node, 1, 0, usize::MAX, 1, 1, 1, &pm), Err(DimapError::Format(_))));
        let one = RasterBuffer::Int16(vec![7]);
        assert!(matches!(io.write_region(&node, usize::MAX, 0, 1, 1, &one, &pm), Err(DimapError::Format(_))));
        assert!(matches!(io.write_region(&node, 0, usize::MAX, 1, 1, &one, &pm), Err(DimapError::Format(_))));

        // a step larger than the region still yields its first sample
        io.write_region(&node, 0, 0, 1, 1, &one, &pm).unwrap();
        let corner = io.read_region(&node, 0, 0, 10, 10, usize::MAX, usize::MAX, &pm).unwrap();
        assert_eq!(corner, RasterBuffer::Int16(vec![7]));
    }

    #[test]
    fn test_oversized_layout_rejected() {
        let mut io = RasterIo::writable();
        let node = RasterNodeId::Band("huge".to_string());
        io.register(
            node.clone(),
            NodeLayout {
                width: usize::MAX / 2,
                height: 4,
                data_type: DataType::Float64,
                sidecar: SidecarState::Bound(PathBuf::from("/nowhere/huge.img")),
            },
        );
        assert!(matches!(io.allocate(&node), Err(DimapError::Format(_))));
        assert!(matches!(
            io.read_region(&node, 0, 0, 1, 1, 1, 1, &ProgressMonitor::new()),
            Err(DimapError::Format(_))
        ));
        assert_eq!(payload_len(3, 2, DataType::Int16).unwrap(), 12);
    }

    #[test]
    fn test_truncated_payload_unavailable() {
        let dir = TempDir::new().unwrap();
        let (io, node) = grid_node(dir.path(), DataType::Float32);
        io.allocate(&node).unwrap();
        io.close().unwrap();
        std::fs::OpenOptions::new()
            .write(true)
            .open(dir.path().join("b.img"))
            .unwrap()
            .set_len(8)
            .unwrap();

        let pm = ProgressMonitor::new();
        assert!(io.read_region(&node, 0, 0, 2, 1, 1, 1, &pm).is_ok());
        assert!(matches!(io.read_region(&node, 0, 5, 2, 2, 1, 1, &pm), Err(DimapError::DataUnavailable(_))));
    }

    #[test]
    fn test_unreadable_node() {
        let mut io = RasterIo::default();
        let node = RasterNodeId::Band("gone".to_string());
        io.register(
            node.clone(),
            NodeLayout {
                width: 2,
                height: 2,
                data_type: DataType::UInt8,
                sidecar: SidecarState::Unreadable(PathBuf::from("/nowhere/gone.img")),
            },
        );
        let result = io.read_region(&node, 0, 0, 1, 1, 1, 1, &ProgressMonitor::new());
        assert!(matches!(result, Err(DimapError::DataUnavailable(_))));
    }

    #[test]
    fn test_buffer_conversions() {
        let buffer = RasterBuffer::from_f64(DataType::UInt8, &[1.0, 300.0, 2.0, 3.0]);
        assert_eq!(buffer, RasterBuffer::UInt8(vec![1, 0, 2, 3]));
        assert_eq!(buffer.get_f64(2), Some(2.0));
        assert_eq!(buffer.get_f64(9), None);
        let array = buffer.to_array2(2, 2).unwrap();
        assert_eq!(array[[1, 1]], 3.0);
        assert!(buffer.to_array2(3, 2).is_err());
    }
}
