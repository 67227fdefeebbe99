use crate::dtype::DType;
use crate::shape::{Shape, MAX_DIMS};
use std::fmt;

/// Handle identifying a tensor within its [`Context`](crate::Context).
///
/// Ids index the context's descriptor table and are invalidated by
/// `Context::reset`; a stale id is rejected with `UnknownTensor` at the
/// point of use rather than reaching dead storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorId(pub(crate) usize);

impl TensorId {
    /// The raw table index, for diagnostics.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The operation that produces a computed tensor's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpKind {
    /// Elementwise addition; the second operand may broadcast.
    Add,
    /// Elementwise multiplication; the second operand may broadcast.
    Mul,
    /// Matrix multiplication over the shared dimension 0.
    MatMul,
    /// Rectified linear unit, `max(0, x)`.
    Relu,
}

impl OpKind {
    pub fn name(&self) -> &'static str {
        match self {
            OpKind::Add => "add",
            OpKind::Mul => "mul",
            OpKind::MatMul => "matmul",
            OpKind::Relu => "relu",
        }
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Producing-op record attached to a computed tensor: which operation, fed
/// by which operands.
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: OpKind,
    pub srcs: Vec<TensorId>,
}

/// A tensor descriptor: logical shape and strides plus the location of its
/// bytes within the owning arena.
///
/// Descriptors never own the bytes they describe; creation and element
/// access go through [`Context`](crate::Context).
#[derive(Debug, Clone)]
pub struct Tensor {
    pub(crate) dtype: DType,
    pub(crate) shape: Shape,
    /// Per-dimension stride in bytes. Every tensor this crate creates is
    /// row-major contiguous over its own extent; strides are still carried
    /// per descriptor so element addressing is computed in exactly one
    /// place ([`Tensor::element_offset`]).
    pub(crate) strides: [usize; MAX_DIMS],
    /// Absolute byte offset of the first element in the arena.
    pub(crate) offset: usize,
    /// Allocated extent in bytes.
    pub(crate) size_bytes: usize,
    /// For views: the tensor whose storage this one aliases.
    pub(crate) view_of: Option<TensorId>,
    /// For views: byte offset into the source's extent.
    pub(crate) view_offset: usize,
    /// Producing operation; `None` for leaf tensors.
    pub(crate) op: Option<Node>,
    /// Caller-assigned label, diagnostics only.
    pub(crate) name: Option<String>,
}

impl Tensor {
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Per-dimension byte strides.
    pub fn strides(&self) -> &[usize; MAX_DIMS] {
        &self.strides
    }

    /// Absolute byte offset of the first element in the arena.
    pub fn data_offset(&self) -> usize {
        self.offset
    }

    /// Allocated extent in bytes.
    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }

    /// True if this tensor aliases another tensor's storage.
    pub fn is_view(&self) -> bool {
        self.view_of.is_some()
    }

    /// The viewed tensor, if this is a view.
    pub fn view_of(&self) -> Option<TensorId> {
        self.view_of
    }

    /// Byte offset into the viewed tensor's extent (0 for non-views).
    pub fn view_offset(&self) -> usize {
        self.view_offset
    }

    /// True if the tensor's values are supplied by the caller rather than
    /// computed by an operation.
    pub fn is_leaf(&self) -> bool {
        self.op.is_none()
    }

    /// The producing operation, for computed tensors.
    pub fn op(&self) -> Option<&Node> {
        self.op.as_ref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Byte offset of the element at `idx`, relative to the tensor's first
    /// element. The single place stride arithmetic happens; used by fill,
    /// set_elements, the read accessors, and every kernel.
    pub fn element_offset(&self, idx: &[usize; MAX_DIMS]) -> usize {
        debug_assert!((0..MAX_DIMS).all(|i| idx[i] < self.shape.dim(i)));
        (0..MAX_DIMS).map(|i| idx[i] * self.strides[i]).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tensor_id_display() {
        assert_eq!(TensorId(3).to_string(), "#3");
        assert_eq!(TensorId(3).index(), 3);
    }

    #[test]
    fn test_op_kind_names() {
        assert_eq!(OpKind::Add.name(), "add");
        assert_eq!(OpKind::MatMul.to_string(), "matmul");
    }

    #[test]
    fn test_element_offset() {
        let shape = Shape::new(&[2, 3]);
        let t = Tensor {
            dtype: DType::F32,
            strides: shape.byte_strides(4),
            shape,
            offset: 0,
            size_bytes: 24,
            view_of: None,
            view_offset: 0,
            op: None,
            name: None,
        };
        assert_eq!(t.element_offset(&[0, 0, 0, 0]), 0);
        assert_eq!(t.element_offset(&[1, 0, 0, 0]), 4);
        assert_eq!(t.element_offset(&[0, 1, 0, 0]), 8);
        assert_eq!(t.element_offset(&[1, 2, 0, 0]), 20);
    }
}
