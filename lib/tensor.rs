use std::fmt;
use itertools::Itertools;
use ndarray::{ self as nd, Dimension, LinalgScalar };
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TensorError {
    /// Returned when a contraction is attempted between two tensors (rank > 0)
    /// with no common indices.
    #[error("error in tensor contraction: no matching indices")]
    NoMatchingIndices,

    /// Returned when a common index has different dimensions on either side of
    /// a contraction or sum.
    #[error("error in tensor contraction: index {0} has dimensions {1} and {2}")]
    IncompatibleDims(String, usize, usize),

    /// Returned when a tensor is created with repeated indices.
    #[error("error in tensor creation: duplicate index {0}")]
    DuplicateIndex(String),

    /// Returned when the number of indices does not match the rank of the
    /// array they are attached to.
    #[error("error in tensor creation: {0} indices for an array of rank {1}")]
    RankMismatch(usize, usize),

    /// Returned when a requested index ordering is not a permutation of the
    /// tensor's indices.
    #[error("error in tensor permutation: index sets do not match")]
    IncompatibleIndices,

    /// Returned when an index is looked up but not present.
    #[error("missing index {0}")]
    MissingIndex(String),

    /// Returned when a relabeling would create a repeated index.
    #[error("index {0} already present")]
    IndexExists(String),

    /// Returned when a scalar value is requested from a tensor of rank > 0.
    #[error("expected a scalar, found a tensor of rank {0}")]
    NotScalar(usize),

    /// Returned when a flattened matrix does not have the number of elements
    /// implied by the requested index dimensions.
    #[error("error in tensor reshape: {0}")]
    Shape(#[from] nd::ShapeError),
}
pub type TensorResult<T> = Result<T, TensorError>;

/// Describes a tensor index.
///
/// Index types carry only identity; the dimension of an index is a property of
/// the array it is attached to, so that the same label can be reused for bonds
/// whose dimension changes during a computation (e.g. after a truncated SVD).
/// Two tensors are contracted over every index they have in common.
///
/// ```ignore
/// #[derive(Copy, Clone, Debug, PartialEq, Eq)]
/// enum Index { A, B, C }
///
/// impl Idx for Index { }
/// ```
pub trait Idx: Clone + Eq + fmt::Debug {
    /// Return an identifying label for the index. This method is used only for
    /// printing and error messages.
    fn label(&self) -> String { format!("{:?}", self) }
}

/// Dense tensor whose axes are identified by labels.
///
/// A `Tensor<T, A>` consists of an `ndarray` array with elements of type `A`
/// and one index of type `T` per axis. All operations are expressed in terms of
/// indices: the position of an axis in the underlying array is an
/// implementation detail that changes freely between operations.
///
/// Contractions are carried out by permuting both operands into matrices and
/// calling into `ndarray`'s matrix product.
#[derive(Clone, PartialEq)]
pub struct Tensor<T, A>(TensorData<T, A>);

impl<T, A> fmt::Debug for Tensor<T, A>
where
    T: fmt::Debug,
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tensor(")?;
        self.0.fmt(f)?;
        write!(f, ")")
    }
}

impl<T, A> fmt::Display for Tensor<T, A>
where
    T: Idx,
    A: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Clone, PartialEq)]
enum TensorData<T, A> {
    Scalar(A),
    Tensor(Vec<T>, nd::ArrayD<A>),
}

impl<T, A> fmt::Debug for TensorData<T, A>
where
    T: fmt::Debug,
    A: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(a) => {
                a.fmt(f)?;
                write!(f, ", type=scalar, rank=0, indices=[]")?;
            },
            Self::Tensor(idxs, a) => {
                write!(
                    f,
                    "type=tensor, rank={}, shape={:?}, indices={:?}",
                    idxs.len(),
                    a.shape(),
                    idxs,
                )?;
            },
        }
        Ok(())
    }
}

impl<T, A> fmt::Display for TensorData<T, A>
where
    T: Idx,
    A: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(a) => {
                a.fmt(f)?;
                write!(f, " {{ }}")?;
            },
            Self::Tensor(idxs, a) => {
                a.fmt(f)?;
                write!(f, " {{ ")?;
                let n_idxs = idxs.len();
                for (k, (idx, dim)) in idxs.iter().zip(a.shape()).enumerate() {
                    write!(f, "{}:{}", idx.label(), dim)?;
                    if k < n_idxs - 1 { write!(f, ", ")?; }
                }
                write!(f, " }}")?;
            },
        }
        Ok(())
    }
}

/// Iterator type over the indices of a given [`Tensor`].
///
/// The iterator item type is `&T`.
pub struct Indices<'a, T>(IndicesData<'a, T>);

enum IndicesData<'a, T> {
    Scalar,
    Tensor(std::slice::Iter<'a, T>),
}

impl<'a, T> Iterator for Indices<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        match &mut self.0 {
            IndicesData::Scalar => None,
            IndicesData::Tensor(iter) => iter.next(),
        }
    }
}

// copy `a` into a standard-layout array after permuting its axes, then flatten
// to a matrix
fn as_matrix<A>(a: &nd::ArrayD<A>, perm: &[usize], shape: (usize, usize))
    -> TensorResult<nd::Array2<A>>
where A: Clone
{
    let permuted: nd::ArrayD<A>
        = a.view()
        .permuted_axes(perm.to_vec())
        .as_standard_layout()
        .into_owned();
    Ok(permuted.into_shape(shape)?)
}

/// Copy `a` into standard (row-major) layout if it is not already.
///
/// `ndarray` reshapes Fortran-contiguous arrays in column-major order, so
/// matrices coming back from LAPACK are passed through this before they are
/// given a higher-rank shape.
pub fn standard_layout<A, D>(a: nd::Array<A, D>) -> nd::Array<A, D>
where
    A: Clone,
    D: Dimension,
{
    if a.is_standard_layout() {
        a
    } else {
        a.as_standard_layout().into_owned()
    }
}

impl<T, A> TensorData<T, A>
where
    T: Idx,
    A: Clone,
{
    fn from_array(indices: Vec<T>, data: nd::ArrayD<A>) -> TensorResult<Self> {
        if indices.len() != data.ndim() {
            return Err(TensorError::RankMismatch(indices.len(), data.ndim()));
        }
        if let Some(dup)
            = indices.iter().duplicates_by(|idx| idx.label()).next()
        {
            return Err(TensorError::DuplicateIndex(dup.label()));
        }
        if indices.is_empty() {
            let val: A
                = data.iter().next().cloned()
                .ok_or(TensorError::RankMismatch(0, 0))?;
            Ok(Self::Scalar(val))
        } else {
            Ok(Self::Tensor(indices, data))
        }
    }

    fn position(&self, index: &T) -> Option<usize> {
        match self {
            Self::Scalar(_) => None,
            Self::Tensor(idxs, _) => idxs.iter().position(|idx| idx == index),
        }
    }

    fn dim(&self, index: &T) -> Option<usize> {
        match self {
            Self::Scalar(_) => None,
            Self::Tensor(_, a) => self.position(index).map(|k| a.shape()[k]),
        }
    }

    fn rank(&self) -> usize {
        match self {
            Self::Scalar(_) => 0,
            Self::Tensor(idxs, _) => idxs.len(),
        }
    }

    fn shape(&self) -> Vec<usize> {
        match self {
            Self::Scalar(_) => Vec::new(),
            Self::Tensor(_, a) => a.shape().to_vec(),
        }
    }

    fn indices(&self) -> Indices<'_, T> {
        match self {
            Self::Scalar(_) => Indices(IndicesData::Scalar),
            Self::Tensor(idxs, _)
                => Indices(IndicesData::Tensor(idxs.iter())),
        }
    }

    // axis positions of `order` within `self`, checking that `order` is a
    // permutation of the indices of `self`
    fn axes_of(&self, order: &[T]) -> TensorResult<Vec<usize>> {
        if order.len() != self.rank() {
            return Err(TensorError::IncompatibleIndices);
        }
        let axes: Vec<usize>
            = order.iter()
            .map(|idx| {
                self.position(idx)
                    .ok_or_else(|| TensorError::MissingIndex(idx.label()))
            })
            .collect::<TensorResult<_>>()?;
        if axes.iter().all_unique() {
            Ok(axes)
        } else {
            Err(TensorError::IncompatibleIndices)
        }
    }
}

impl<T, A> TensorData<T, A>
where
    T: Idx,
    A: LinalgScalar,
{
    fn contract(&self, other: &Self) -> TensorResult<Self> {
        match (self, other) {
            (Self::Scalar(a), Self::Scalar(b)) => Ok(Self::Scalar(*a * *b)),
            (Self::Scalar(a), Self::Tensor(idxs, b)) => {
                Ok(Self::Tensor(idxs.clone(), b.mapv(|bk| *a * bk)))
            },
            (Self::Tensor(idxs, a), Self::Scalar(b)) => {
                Ok(Self::Tensor(idxs.clone(), a.mapv(|ak| ak * *b)))
            },
            (Self::Tensor(idxs_a, a), Self::Tensor(idxs_b, b)) => {
                // pair up common indices, error if none
                let mut common: Vec<(usize, usize)> = Vec::new();
                for (k_a, idx) in idxs_a.iter().enumerate() {
                    if let Some(k_b) = idxs_b.iter().position(|i| i == idx) {
                        let (dim_a, dim_b) = (a.shape()[k_a], b.shape()[k_b]);
                        if dim_a != dim_b {
                            return Err(TensorError::IncompatibleDims(
                                idx.label(), dim_a, dim_b));
                        }
                        common.push((k_a, k_b));
                    }
                }
                (!common.is_empty()).then_some(())
                    .ok_or(TensorError::NoMatchingIndices)?;

                let free_a: Vec<usize>
                    = (0..idxs_a.len())
                    .filter(|k| !common.iter().any(|(k_a, _)| k_a == k))
                    .collect();
                let free_b: Vec<usize>
                    = (0..idxs_b.len())
                    .filter(|k| !common.iter().any(|(_, k_b)| k_b == k))
                    .collect();

                // move free axes of `a` to the front and free axes of `b` to
                // the back, then a single matrix product does the summing
                let m: usize = free_a.iter().map(|k| a.shape()[*k]).product();
                let n: usize = free_b.iter().map(|k| b.shape()[*k]).product();
                let s: usize
                    = common.iter().map(|(k_a, _)| a.shape()[*k_a]).product();
                let perm_a: Vec<usize>
                    = free_a.iter().copied()
                    .chain(common.iter().map(|(k_a, _)| *k_a))
                    .collect();
                let perm_b: Vec<usize>
                    = common.iter().map(|(_, k_b)| *k_b)
                    .chain(free_b.iter().copied())
                    .collect();
                let mat_a = as_matrix(a, &perm_a, (m, s))?;
                let mat_b = as_matrix(b, &perm_b, (s, n))?;
                let prod: nd::Array2<A> = mat_a.dot(&mat_b);

                let new_idxs: Vec<T>
                    = free_a.iter().map(|k| idxs_a[*k].clone())
                    .chain(free_b.iter().map(|k| idxs_b[*k].clone()))
                    .collect();
                if new_idxs.is_empty() {
                    Ok(Self::Scalar(prod[[0, 0]]))
                } else {
                    let new_shape: Vec<usize>
                        = free_a.iter().map(|k| a.shape()[*k])
                        .chain(free_b.iter().map(|k| b.shape()[*k]))
                        .collect();
                    let new_data = prod.into_shape(nd::IxDyn(&new_shape))?;
                    Ok(Self::Tensor(new_idxs, new_data))
                }
            },
        }
    }
}

impl<T, A> From<TensorData<T, A>> for Tensor<T, A> {
    fn from(data: TensorData<T, A>) -> Self { Self(data) }
}

impl<T, A> Tensor<T, A>
where
    T: Idx,
    A: Clone,
{
    /// Attach indices to an array, one per axis in order.
    pub fn from_array<I>(indices: I, data: nd::ArrayD<A>) -> TensorResult<Self>
    where I: IntoIterator<Item = T>
    {
        TensorData::from_array(indices.into_iter().collect(), data)
            .map(|data| data.into())
    }

    /// Create a new tensor using a function over given `(index, dimension)`
    /// pairs.
    pub fn from_fn<I, F>(indices: I, mut elems: F) -> TensorResult<Self>
    where
        I: IntoIterator<Item = (T, usize)>,
        F: FnMut(&[usize]) -> A,
    {
        let (idxs, shape): (Vec<T>, Vec<usize>) = indices.into_iter().unzip();
        let data: nd::ArrayD<A>
            = nd::ArrayD::from_shape_fn(
                shape,
                |k| elems(k.as_array_view().to_slice().unwrap_or(&[])),
            );
        Self::from_array(idxs, data)
    }

    /// Create a new rank-0 (scalar) tensor.
    pub fn new_scalar(val: A) -> Self { TensorData::Scalar(val).into() }

    /// Return `true` if `self` has rank 0.
    pub fn is_scalar(&self) -> bool { matches!(self.0, TensorData::Scalar(_)) }

    /// Return `true` if `self` has the given index.
    pub fn has_index(&self, index: &T) -> bool {
        self.0.position(index).is_some()
    }

    /// Return the dimension of an index, if present.
    pub fn dim(&self, index: &T) -> Option<usize> { self.0.dim(index) }

    /// Return the dimension of an index, or an error if it is not present.
    pub fn dim_of(&self, index: &T) -> TensorResult<usize> {
        self.0.dim(index)
            .ok_or_else(|| TensorError::MissingIndex(index.label()))
    }

    /// Return the rank of `self`.
    pub fn rank(&self) -> usize { self.0.rank() }

    /// Return the shape of `self` in the current storage order of its indices.
    pub fn shape(&self) -> Vec<usize> { self.0.shape() }

    /// Return an iterator over all indices in storage order.
    ///
    /// If `self` is a scalar, the iterator is empty.
    pub fn indices(&self) -> Indices<'_, T> { self.0.indices() }

    /// Return the value of a rank-0 tensor.
    pub fn scalar(&self) -> TensorResult<A> {
        match &self.0 {
            TensorData::Scalar(a) => Ok(a.clone()),
            TensorData::Tensor(idxs, _)
                => Err(TensorError::NotScalar(idxs.len())),
        }
    }

    /// Replace the index `from` by `to`.
    pub fn relabel(&mut self, from: &T, to: T) -> TensorResult<()> {
        if self.has_index(&to) {
            return Err(TensorError::IndexExists(to.label()));
        }
        let k
            = self.0.position(from)
            .ok_or_else(|| TensorError::MissingIndex(from.label()))?;
        if let TensorData::Tensor(idxs, _) = &mut self.0 {
            idxs[k] = to;
        }
        Ok(())
    }

    /// Apply a function to every index.
    pub fn map_indices<F>(self, mut f: F) -> TensorResult<Self>
    where F: FnMut(T) -> T
    {
        match self.0 {
            TensorData::Scalar(a) => Ok(Self::new_scalar(a)),
            TensorData::Tensor(idxs, data) => {
                Self::from_array(idxs.into_iter().map(&mut f), data)
            },
        }
    }

    /// Return a copy of `self` with its storage order set to `order`, which
    /// must be a permutation of the indices of `self`.
    pub fn permuted(&self, order: &[T]) -> TensorResult<Self> {
        match &self.0 {
            TensorData::Scalar(a) => {
                order.is_empty().then_some(())
                    .ok_or(TensorError::IncompatibleIndices)?;
                Ok(Self::new_scalar(a.clone()))
            },
            TensorData::Tensor(_, data) => {
                let axes = self.0.axes_of(order)?;
                let new_data: nd::ArrayD<A>
                    = data.view()
                    .permuted_axes(axes)
                    .as_standard_layout()
                    .into_owned();
                Self::from_array(order.to_vec(), new_data)
            },
        }
    }

    /// Return the underlying array with axes in the given index order.
    pub fn to_array(&self, order: &[T]) -> TensorResult<nd::ArrayD<A>> {
        match self.permuted(order)?.0 {
            TensorData::Scalar(a) => Ok(nd::arr0(a).into_dyn()),
            TensorData::Tensor(_, data) => Ok(data),
        }
    }

    /// Flatten `self` to a matrix whose row index runs over `rows` and column
    /// index over `cols` (both row-major), which together must cover every
    /// index of `self` exactly once.
    pub fn to_matrix(&self, rows: &[T], cols: &[T])
        -> TensorResult<nd::Array2<A>>
    {
        let order: Vec<T> = rows.iter().chain(cols).cloned().collect();
        match &self.0 {
            TensorData::Scalar(a) => {
                order.is_empty().then_some(())
                    .ok_or(TensorError::IncompatibleIndices)?;
                Ok(nd::arr2(&[[a.clone()]]))
            },
            TensorData::Tensor(_, data) => {
                let axes = self.0.axes_of(&order)?;
                let m: usize
                    = axes[..rows.len()].iter().map(|k| data.shape()[*k])
                    .product();
                let n: usize
                    = axes[rows.len()..].iter().map(|k| data.shape()[*k])
                    .product();
                as_matrix(data, &axes, (m, n))
            },
        }
    }

    /// Inverse of [`to_matrix`][Self::to_matrix]: unflatten a matrix given the
    /// `(index, dimension)` pairs of its rows and columns.
    pub fn from_matrix(
        mat: nd::Array2<A>,
        rows: &[(T, usize)],
        cols: &[(T, usize)],
    ) -> TensorResult<Self>
    {
        let (idxs, shape): (Vec<T>, Vec<usize>)
            = rows.iter().chain(cols).cloned().unzip();
        let data: nd::ArrayD<A>
            = standard_layout(mat).into_shape(nd::IxDyn(&shape))?;
        Self::from_array(idxs, data)
    }
}

impl<T, A> Tensor<T, A>
where
    T: Idx,
    A: LinalgScalar,
{
    /// Create a tensor of ones over the given `(index, dimension)` pairs.
    pub fn ones<I>(indices: I) -> TensorResult<Self>
    where I: IntoIterator<Item = (T, usize)>
    {
        Self::from_fn(indices, |_| A::one())
    }

    /// Contract `self` with `other` over all common indices.
    ///
    /// The result carries the non-common indices of `self` followed by those of
    /// `other`, each group in its original order. Scalars multiply through.
    pub fn contract(&self, other: &Self) -> TensorResult<Self> {
        self.0.contract(&other.0).map(|data| data.into())
    }

    /// Multiply every element by `a`.
    pub fn scale(&mut self, a: A) {
        match &mut self.0 {
            TensorData::Scalar(x) => { *x = *x * a; },
            TensorData::Tensor(_, data) => { data.mapv_inplace(|x| x * a); },
        }
    }

    /// Full inner product `Σ self * other` between tensors with identical
    /// index sets.
    pub fn dot(&self, other: &Self) -> TensorResult<A> {
        let order: Vec<T> = self.indices().cloned().collect();
        let other = other.permuted(&order)?;
        match (&self.0, &other.0) {
            (TensorData::Scalar(a), TensorData::Scalar(b)) => Ok(*a * *b),
            (TensorData::Tensor(_, a), TensorData::Tensor(_, b)) => {
                if a.shape() != b.shape() {
                    return Err(TensorError::IncompatibleIndices);
                }
                Ok(
                    a.iter().zip(b.iter())
                        .fold(A::zero(), |acc, (ak, bk)| acc + *ak * *bk)
                )
            },
            _ => Err(TensorError::IncompatibleIndices),
        }
    }

    /// Element-wise `self + a * other` for tensors with identical index sets.
    pub fn add_scaled(&self, a: A, other: &Self) -> TensorResult<Self> {
        let order: Vec<T> = self.indices().cloned().collect();
        let other = other.permuted(&order)?;
        match (&self.0, &other.0) {
            (TensorData::Scalar(x), TensorData::Scalar(y))
                => Ok(Self::new_scalar(*x + a * *y)),
            (TensorData::Tensor(idxs, x), TensorData::Tensor(_, y)) => {
                if x.shape() != y.shape() {
                    return Err(TensorError::IncompatibleIndices);
                }
                let mut z = x.clone();
                z.zip_mut_with(y, |zk, yk| { *zk = *zk + a * *yk; });
                Self::from_array(idxs.clone(), z)
            },
            _ => Err(TensorError::IncompatibleIndices),
        }
    }
}

impl<T> Tensor<T, f64>
where T: Idx
{
    /// Return the Frobenius norm.
    pub fn norm(&self) -> f64 {
        match &self.0 {
            TensorData::Scalar(a) => a.abs(),
            TensorData::Tensor(_, data)
                => data.iter().map(|x| x * x).sum::<f64>().sqrt(),
        }
    }

    /// Return `true` if every element is finite.
    pub fn is_finite(&self) -> bool {
        match &self.0 {
            TensorData::Scalar(a) => a.is_finite(),
            TensorData::Tensor(_, data) => data.iter().all(|x| x.is_finite()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    enum Q { I, J, K, L }

    impl Idx for Q { }

    #[test]
    fn matrix_product() {
        let a = Tensor::from_array(
            [Q::I, Q::J], array![[1.0, 2.0], [3.0, 4.0]].into_dyn()).unwrap();
        let b = Tensor::from_array(
            [Q::J, Q::K], array![[0.0, 1.0], [1.0, 0.0]].into_dyn()).unwrap();
        let c = a.contract(&b).unwrap();
        assert_eq!(c.indices().copied().collect::<Vec<_>>(), vec![Q::I, Q::K]);
        assert_eq!(
            c.to_array(&[Q::I, Q::K]).unwrap(),
            array![[2.0, 1.0], [4.0, 3.0]].into_dyn(),
        );
    }

    #[test]
    fn contraction_independent_of_storage_order() {
        let a: Tensor<Q, f64>
            = Tensor::from_fn(
                [(Q::I, 2), (Q::J, 3), (Q::K, 4)],
                |k| (k[0] * 12 + k[1] * 4 + k[2]) as f64,
            ).unwrap();
        let b: Tensor<Q, f64>
            = Tensor::from_fn(
                [(Q::K, 4), (Q::L, 2), (Q::J, 3)],
                |k| (k[0] as f64) - 0.5 * (k[1] as f64) + (k[2] as f64).powi(2),
            ).unwrap();
        let c1 = a.contract(&b).unwrap();
        let c2 = a.permuted(&[Q::K, Q::I, Q::J]).unwrap()
            .contract(&b.permuted(&[Q::J, Q::K, Q::L]).unwrap())
            .unwrap();
        let x1 = c1.to_array(&[Q::I, Q::L]).unwrap();
        let x2 = c2.to_array(&[Q::I, Q::L]).unwrap();
        assert_eq!(x1, x2);

        // brute force
        for i in 0..2 {
            for l in 0..2 {
                let mut acc = 0.0;
                for j in 0..3 {
                    for k in 0..4 {
                        let ak = (i * 12 + j * 4 + k) as f64;
                        let bk = (k as f64) - 0.5 * (l as f64)
                            + (j as f64).powi(2);
                        acc += ak * bk;
                    }
                }
                assert!((x1[[i, l]] - acc).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn full_contraction_gives_scalar() {
        let a: Tensor<Q, f64>
            = Tensor::from_fn([(Q::I, 3), (Q::J, 2)], |k| (k[0] + k[1]) as f64)
            .unwrap();
        let s = a.contract(&a).unwrap();
        assert!(s.is_scalar());
        assert_eq!(s.scalar().unwrap(), a.dot(&a).unwrap());
        assert!((a.norm().powi(2) - s.scalar().unwrap()).abs() < 1e-12);
    }

    #[test]
    fn no_common_indices() {
        let a: Tensor<Q, f64> = Tensor::ones([(Q::I, 2)]).unwrap();
        let b: Tensor<Q, f64> = Tensor::ones([(Q::J, 2)]).unwrap();
        assert!(matches!(a.contract(&b), Err(TensorError::NoMatchingIndices)));
    }

    #[test]
    fn mismatched_dims() {
        let a: Tensor<Q, f64> = Tensor::ones([(Q::I, 2)]).unwrap();
        let b: Tensor<Q, f64> = Tensor::ones([(Q::I, 3)]).unwrap();
        assert!(matches!(
            a.contract(&b),
            Err(TensorError::IncompatibleDims(_, 2, 3)),
        ));
    }

    #[test]
    fn matrix_flattening_is_invertible() {
        let a: Tensor<Q, f64>
            = Tensor::from_fn(
                [(Q::I, 2), (Q::J, 3), (Q::K, 2)],
                |k| (k[0] * 6 + k[1] * 2 + k[2]) as f64,
            ).unwrap();
        let mat = a.to_matrix(&[Q::K, Q::I], &[Q::J]).unwrap();
        assert_eq!(mat.dim(), (4, 3));
        let b = Tensor::from_matrix(
            mat, &[(Q::K, 2), (Q::I, 2)], &[(Q::J, 3)]).unwrap();
        assert_eq!(a.add_scaled(-1.0, &b).unwrap().norm(), 0.0);
    }

    #[test]
    fn fortran_layout_matrix() {
        let mat = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]].reversed_axes();
        let t = Tensor::from_matrix(mat, &[(Q::I, 3)], &[(Q::J, 2)]).unwrap();
        let back = t.to_array(&[Q::I, Q::J]).unwrap();
        assert_eq!(back, array![[1.0, 4.0], [2.0, 5.0], [3.0, 6.0]].into_dyn());
    }

    #[test]
    fn relabel_rejects_duplicates() {
        let mut a: Tensor<Q, f64>
            = Tensor::ones([(Q::I, 2), (Q::J, 2)]).unwrap();
        assert!(a.relabel(&Q::I, Q::J).is_err());
        a.relabel(&Q::I, Q::K).unwrap();
        assert!(a.has_index(&Q::K) && !a.has_index(&Q::I));
    }
}
