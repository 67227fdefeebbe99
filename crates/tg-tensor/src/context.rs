//! The context: owner of the arena and every tensor descriptor.
//!
//! All tensor creation and byte population goes through a `Context`.
//! Callers hold plain [`TensorId`] handles; the context validates them on
//! every access, so a handle issued before a `reset` surfaces as
//! `UnknownTensor` instead of reaching recycled storage.
//!
//! Construction is single-threaded by contract: every mutating method
//! takes `&mut self`, which makes the compiler enforce the serialization
//! the arena cursor requires.

use crate::arena::{Arena, TENSOR_ALIGN};
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::tensor::{Node, OpKind, Tensor, TensorId};

/// Owner of the arena and the tensor descriptor table.
#[derive(Debug)]
pub struct Context {
    arena: Arena,
    tensors: Vec<Tensor>,
}

impl Context {
    /// Create a context whose arena holds `capacity_bytes`.
    pub fn new(capacity_bytes: usize) -> Result<Self> {
        Ok(Context {
            arena: Arena::new(capacity_bytes)?,
            tensors: Vec::new(),
        })
    }

    /// Number of live tensor descriptors.
    pub fn num_tensors(&self) -> usize {
        self.tensors.len()
    }

    /// Bytes consumed from the arena so far.
    pub fn used_bytes(&self) -> usize {
        self.arena.used_bytes()
    }

    /// Arena capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.arena.capacity()
    }

    /// Look up a descriptor, rejecting stale or out-of-range ids.
    pub fn tensor(&self, id: TensorId) -> Result<&Tensor> {
        self.tensors
            .get(id.0)
            .ok_or(TensorError::UnknownTensor { id: id.0 })
    }

    fn tensor_mut(&mut self, id: TensorId) -> Result<&mut Tensor> {
        self.tensors
            .get_mut(id.0)
            .ok_or(TensorError::UnknownTensor { id: id.0 })
    }

    /// Allocate a leaf tensor with row-major layout.
    ///
    /// Allocation failure surfaces as `TensorCreation` wrapping the arena's
    /// `OutOfMemory`; no descriptor is created on failure.
    pub fn new_tensor(&mut self, dtype: DType, shape: Shape) -> Result<TensorId> {
        self.create(dtype, shape, None)
    }

    /// Allocate a computed tensor and record the operation that will
    /// produce its values.
    ///
    /// Used by the operation constructors; performs no computation. All
    /// operand ids must already exist, which also guarantees the operand
    /// storage sits below the new tensor's, which the executor depends on.
    pub fn new_node(
        &mut self,
        dtype: DType,
        shape: Shape,
        kind: OpKind,
        srcs: &[TensorId],
    ) -> Result<TensorId> {
        for &src in srcs {
            self.tensor(src)?;
        }
        self.create(
            dtype,
            shape,
            Some(Node {
                kind,
                srcs: srcs.to_vec(),
            }),
        )
    }

    fn create(&mut self, dtype: DType, shape: Shape, op: Option<Node>) -> Result<TensorId> {
        let size_bytes = shape.numel() * dtype.size_in_bytes();
        let offset = self
            .arena
            .allocate(size_bytes, TENSOR_ALIGN)
            .map_err(|e| TensorError::TensorCreation {
                shape: shape.to_vec(),
                source: Box::new(e),
            })?;
        let id = TensorId(self.tensors.len());
        self.tensors.push(Tensor {
            dtype,
            strides: shape.byte_strides(dtype.size_in_bytes()),
            shape,
            offset,
            size_bytes,
            view_of: None,
            view_offset: 0,
            op,
            name: None,
        });
        Ok(id)
    }

    /// Create a view aliasing `source`'s storage under a new shape,
    /// starting `byte_offset` bytes into the source's extent.
    ///
    /// The view inherits the source's dtype and never owns bytes; bounds
    /// are validated here, once, so later element access cannot stray
    /// outside the source. Fails with `ViewOutOfBounds` when
    /// `byte_offset + required_bytes` exceeds the source's extent.
    pub fn new_view(
        &mut self,
        source: TensorId,
        shape: Shape,
        byte_offset: usize,
    ) -> Result<TensorId> {
        let src = self.tensor(source)?;
        let dtype = src.dtype;
        let required = shape.numel() * dtype.size_in_bytes();
        let fits = byte_offset
            .checked_add(required)
            .is_some_and(|end| end <= src.size_bytes);
        if !fits {
            return Err(TensorError::ViewOutOfBounds {
                offset: byte_offset,
                required,
                available: src.size_bytes,
            });
        }
        let offset = src.offset + byte_offset;
        let id = TensorId(self.tensors.len());
        self.tensors.push(Tensor {
            dtype,
            strides: shape.byte_strides(dtype.size_in_bytes()),
            shape,
            offset,
            size_bytes: required,
            view_of: Some(source),
            view_offset: byte_offset,
            op: None,
            name: None,
        });
        Ok(id)
    }

    /// Attach a diagnostic label. Cosmetic only: names never affect graph
    /// semantics or evaluation order.
    pub fn set_name(&mut self, id: TensorId, name: &str) -> Result<()> {
        self.tensor_mut(id)?.name = Some(name.to_string());
        Ok(())
    }

    /// Broadcast a single scalar to every element, converting to the
    /// tensor's dtype (f16 values are rounded at the storage boundary).
    pub fn fill(&mut self, id: TensorId, value: f32) -> Result<()> {
        let t = self.tensor(id)?.clone();
        let data = self.arena.bytes_mut(t.offset, t.size_bytes);
        for flat in 0..t.shape().numel() {
            let idx = t.shape().unflatten(flat);
            t.dtype().store(data, t.element_offset(&idx), value);
        }
        Ok(())
    }

    /// Copy `values` (row-major) into the tensor, honoring its strides, so
    /// it is correct for views as well as directly allocated tensors.
    ///
    /// The length must equal the tensor's element count.
    pub fn set_elements(&mut self, id: TensorId, values: &[f32]) -> Result<()> {
        let t = self.tensor(id)?.clone();
        let numel = t.shape().numel();
        if values.len() != numel {
            return Err(TensorError::WrongElementCount {
                expected: numel,
                got: values.len(),
            });
        }
        let data = self.arena.bytes_mut(t.offset, t.size_bytes);
        for (flat, &value) in values.iter().enumerate() {
            let idx = t.shape().unflatten(flat);
            t.dtype().store(data, t.element_offset(&idx), value);
        }
        Ok(())
    }

    /// Strided, dtype-converted copy of the tensor's elements in row-major
    /// order.
    pub fn to_vec_f32(&self, id: TensorId) -> Result<Vec<f32>> {
        let t = self.tensor(id)?;
        let data = self.arena.bytes(t.offset, t.size_bytes);
        Ok((0..t.shape().numel())
            .map(|flat| {
                let idx = t.shape().unflatten(flat);
                t.dtype().load(data, t.element_offset(&idx))
            })
            .collect())
    }

    /// The tensor's exact byte extent in the arena, for dump utilities and
    /// bit-level comparisons.
    pub fn raw_bytes(&self, id: TensorId) -> Result<&[u8]> {
        let t = self.tensor(id)?;
        Ok(self.arena.bytes(t.offset, t.size_bytes))
    }

    /// Split arena storage at `offset`: bytes below read-only, bytes at and
    /// above writable. The executor uses this to read operands while
    /// writing one node's output.
    pub fn split_storage(&mut self, offset: usize) -> (&[u8], &mut [u8]) {
        self.arena.split(offset)
    }

    /// Rewind the arena and drop every descriptor.
    ///
    /// All previously issued ids become stale and are rejected with
    /// `UnknownTensor` from then on.
    pub fn reset(&mut self) {
        self.arena.reset();
        self.tensors.clear();
    }

    /// Human-readable dump of a tensor's metadata and leading elements.
    pub fn describe(&self, id: TensorId) -> Result<String> {
        const MAX_ELEMENTS: usize = 8;

        let t = self.tensor(id)?;
        let mut out = format!("tensor {id}: {}\n", t.name().unwrap_or("(unnamed)"));
        out.push_str(&format!("  dtype: {}\n", t.dtype()));
        out.push_str(&format!(
            "  dims: {}  strides: {:?}\n",
            t.shape(),
            t.strides()
        ));
        if let Some(src) = t.view_of() {
            out.push_str(&format!(
                "  view of {src} at byte offset {}\n",
                t.view_offset()
            ));
        }
        if let Some(node) = t.op() {
            let srcs: Vec<String> = node.srcs.iter().map(|s| s.to_string()).collect();
            out.push_str(&format!("  op: {}({})\n", node.kind, srcs.join(", ")));
        }
        let values = self.to_vec_f32(id)?;
        let shown: Vec<String> = values
            .iter()
            .take(MAX_ELEMENTS)
            .map(|v| format!("{v}"))
            .collect();
        let ellipsis = if values.len() > MAX_ELEMENTS { " ..." } else { "" };
        out.push_str(&format!("  data: {}{}\n", shown.join(" "), ellipsis));
        Ok(out)
    }
}
