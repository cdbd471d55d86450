//! Bond-limited matrix product states for registers of qubits.
//!
//! In this representation, an *n*-qubit state is factored into a chain of
//! rank-3 tensors, one per site, connected by "bond" indices. Each tensor
//! `A[k]` carries a left bond `u{k - 1}`, a physical index `s{k}` (dimension 2)
//! and a right bond `u{k}`. The boundary bonds `u{-1}` and `u{n - 1}` are held
//! fixed at dimension 1.
//!
//! ```text
//!       .- bond 0 -.       .- bond 1 -.       .- bond n-2 -.
//!       V          V       V          V       V            V
//! A[0] ------------- A[1] ------------- ... ------------------ A[n-1]
//!  |                  |                                          |
//!  | <- physical      | <- physical                              | <- physical
//!       index 0            index 1                                    index n-1
//! ```
//!
//! Unlike a Schmidt-form (Γ-Λ) factorization, singular values are not kept
//! around separately. Instead the chain is kept track of in terms of an
//! *orthogonality center*: all tensors to the left of the center are
//! column-isometries when their physical index is fused with the left bond, and
//! all tensors to the right are row-isometries when their physical index is
//! fused with the right bond. Truncation at the center is then optimal in the
//! two-norm sense.
//!
//! Site `k` of the chain is the *most* significant bit of a dense state's basis
//! index when `k == 0`, which places it on qubit `n - 1 - k` in the
//! least-significant-bit qubit ordering used by [`Gate`].
//!
//! # Example
//!
//! ```
//! use nalgebra as na;
//! use num_complex::Complex64 as C64;
//! use num_traits::{ One, Zero };
//! use mps_encode::mps::MPS;
//!
//! let h = C64::from(std::f64::consts::FRAC_1_SQRT_2);
//! let hadamard: na::DMatrix<C64> =
//!     na::dmatrix!(
//!         h,  h;
//!         h, -h;
//!     );
//! let cx: na::DMatrix<C64> =
//!     na::dmatrix!(
//!         C64::one(),  C64::zero(), C64::zero(), C64::zero();
//!         C64::zero(), C64::one(),  C64::zero(), C64::zero();
//!         C64::zero(), C64::zero(), C64::zero(), C64::one();
//!         C64::zero(), C64::zero(), C64::one(),  C64::zero();
//!     );
//!
//! // ∣000⟩
//! let mut zero = vec![C64::zero(); 8];
//! zero[0] = C64::one();
//! let mut mps = MPS::from_dense(&zero).unwrap();
//!
//! // GHZ state
//! mps.apply_single_site_gate(&hadamard, 0).unwrap();
//! mps.apply_two_site_gate(&cx, 0).unwrap();
//! mps.apply_two_site_gate(&cx, 1).unwrap();
//! assert_eq!(mps.max_bond_dim(), Some(2));
//!
//! let state = mps.to_dense();
//! assert!((state[0] - h).norm() < 1e-12);
//! assert!((state[7] - h).norm() < 1e-12);
//! ```

use std::{ fmt, mem };
use itertools::Itertools;
use nalgebra as na;
use num_complex::Complex64 as C64;
use num_traits::One;
use thiserror::Error;
use crate::{ circuit::Gate, qubit_count };

#[derive(Clone, Debug, PartialEq, Error)]
pub enum MPSError {
    /// Returned when attempting to create a new MPS from a state vector whose
    /// length is not a power of two of at least 2.
    #[error("error in MPS creation: state length {0} is not a power of two ≥ 2")]
    InvalidLength(usize),

    /// Returned when attempting to create a new MPS from a state vector that
    /// isn't normalized.
    #[error("error in MPS creation: state is not normalized (norm = {0})")]
    NotNormalized(f64),

    /// Returned when attempting to apply an operator to an MPS with a matrix
    /// whose dimensions do not agree with the relevant physical indice(s).
    #[error("error in operator application: incorrect shape")]
    OperatorIncompatibleShape,

    /// Returned when an operation names a site outside of the chain.
    #[error("error in operator application: site {site} out of bounds for {n} sites")]
    SiteOutOfBounds { site: usize, n: usize },

    /// Returned when a gate acts on qubits that are not one or two adjacent
    /// qubits in increasing order.
    #[error("error in gate application: unsupported qubit set {0:?}")]
    UnsupportedGate(Vec<usize>),
}
use MPSError::*;
pub type MPSResult<T> = Result<T, MPSError>;

/// Allowed deviation of a dense input state's norm from 1.
pub const NORM_TOL: f64 = 1e-6;

/// Singular values smaller than this fraction of the largest are treated as
/// numerically zero and dropped from every factorization.
pub const SVAL_CUTOFF: f64 = 1e-14;

/// A single rank-3 site tensor in a matrix product state.
///
/// Diagrammatically,
/// ```text
///  u       v
/// ---- A ----
///      |
///      | s
/// ```
/// where `s` is the (qubit) physical index and `u` and `v` are bond indices.
/// Since `nalgebra` doesn't provide any rank-3 structures, the tensor is held
/// as an ordinary matrix `A_<us>v` with shape `(2·dim(u), dim(v))` and row
/// index `u + dim(u)·s`. Because `nalgebra` matrices are column-major, this
/// matrix can be reinterpreted without copying as `A_u<sv>` with shape
/// `(dim(u), 2·dim(v))` and column index `s + 2·v`.
#[derive(Clone, Debug, PartialEq)]
pub struct Site {
    left: usize,
    right: usize,
    data: na::DMatrix<C64>,
}

impl Default for Site {
    fn default() -> Self {
        Self { left: 0, right: 0, data: na::DMatrix::zeros(0, 0) }
    }
}

impl Site {
    // `data` has shape `(2 * left, right)`
    fn new_lfused(left: usize, data: na::DMatrix<C64>) -> Self {
        debug_assert_eq!(data.nrows(), 2 * left, "inconsistent dimensions");
        let right = data.ncols();
        Self { left, right, data }
    }

    // `data` has shape `(left, 2 * right)`
    fn from_rfused(data: na::DMatrix<C64>) -> Self {
        debug_assert_eq!(data.ncols() % 2, 0, "inconsistent dimensions");
        let (left, sr) = data.shape();
        let right = sr / 2;
        let data = data.reshape_generic(na::Dyn(2 * left), na::Dyn(right));
        Self { left, right, data }
    }

    /// Return the dimensions of the left bond, physical, and right bond
    /// indices.
    pub fn dims(&self) -> (usize, usize, usize) { (self.left, 2, self.right) }

    /// Return the dimension of the left bond index.
    pub fn left(&self) -> usize { self.left }

    /// Return the dimension of the right bond index.
    pub fn right(&self) -> usize { self.right }

    /// Return the tensor with the physical index fused to the left bond.
    pub fn lfused(&self) -> &na::DMatrix<C64> { &self.data }

    /// Return a copy of the tensor with the physical index fused to the right
    /// bond.
    pub fn rfused(&self) -> na::DMatrix<C64> {
        self.data.clone()
            .reshape_generic(na::Dyn(self.left), na::Dyn(2 * self.right))
    }

    fn into_rfused(self) -> na::DMatrix<C64> {
        self.data.reshape_generic(na::Dyn(self.left), na::Dyn(2 * self.right))
    }

    /// Return the `(dim(u), dim(v))` matrix for a fixed value `s` of the
    /// physical index.
    pub fn slice(&self, s: usize) -> na::DMatrixView<'_, C64> {
        self.data.view((self.left * s, 0), (self.left, self.right))
    }

    // left-multiply the physical index by `op`
    fn apply_op(&mut self, op: &na::DMatrix<C64>) {
        let l = self.left;
        let data = &self.data;
        let new =
            na::DMatrix::from_fn(2 * l, self.right, |us, v| {
                let (u, s) = (us % l, us / l);
                (0..2)
                    .map(|t| op[(s, t)] * data[(u + l * t, v)])
                    .sum::<C64>()
            });
        self.data = new;
    }
}

/// Data struct holding a (sorted, possibly truncated) singular value
/// decomposition, repurposed for MPS factorization.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Schmidt {
    /// Left singular column vectors.
    pub u: na::DMatrix<C64>,
    /// Singular values, in descending order.
    pub s: na::DVector<f64>,
    /// Right singular row vectors.
    pub q: na::DMatrix<C64>,
    /// Number of kept singular values.
    pub rank: usize,
}

impl Schmidt {
    /// Decompose `m`, dropping singular values below [`SVAL_CUTOFF`] (relative
    /// to the largest) and optionally keeping at most `max_rank` of them. At
    /// least one singular value is always kept.
    pub fn from_decomp(m: na::DMatrix<C64>, max_rank: Option<usize>) -> Self {
        let svd = m.svd(true, true);
        let Some(u) = svd.u else { unreachable!() };
        let Some(q) = svd.v_t else { unreachable!() };
        let s = svd.singular_values;
        let order: Vec<usize> =
            (0 .. s.len())
            .sorted_by(|&a, &b| s[b].total_cmp(&s[a]))
            .collect();
        let smax = order.first().map(|&j| s[j]).unwrap_or(0.0);
        let nonzero =
            order.iter()
            .take_while(|&&j| s[j].is_normal() && s[j] > SVAL_CUTOFF * smax)
            .count()
            .max(1);
        let rank =
            match max_rank {
                Some(r) => nonzero.min(r.max(1)),
                None => nonzero,
            }
            .min(order.len().max(1));
        let keep = &order[..rank];
        let u = u.select_columns(keep.iter());
        let q = q.select_rows(keep.iter());
        let s = na::DVector::from_iterator(rank, keep.iter().map(|&j| s[j]));
        Self { u, s, q, rank }
    }

    /// Return the right singular vectors scaled by their singular values.
    pub fn weighted_q(&self) -> na::DMatrix<C64> {
        let mut q = self.q.clone();
        q.row_iter_mut().zip(self.s.iter())
            .for_each(|(mut qv, sv)| { qv.scale_mut(*sv); });
        q
    }
}

/// Direction of a canonicalization sweep.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Sweep left to right, leaving every site but the last as a
    /// column-isometry (`A_<us>v`). The orthogonality center ends on the last
    /// site.
    Left,
    /// Sweep right to left, leaving every site but the first as a
    /// row-isometry (`A_u<sv>`). The orthogonality center ends on the first
    /// site.
    Right,
}

/// Position of a site in the chain, determining which of its bonds are
/// implicit (fixed to dimension 1).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SiteKind {
    /// The only site of a single-qubit chain; both bonds are implicit.
    Only,
    /// The first site; the left bond is implicit.
    First,
    /// Any site with two explicit bonds.
    Bulk,
    /// The last site; the right bond is implicit.
    Last,
}

impl SiteKind {
    /// Return `true` if the left bond of the site is implicit.
    pub fn implicit_left(&self) -> bool { matches!(self, Self::Only | Self::First) }

    /// Return `true` if the right bond of the site is implicit.
    pub fn implicit_right(&self) -> bool { matches!(self, Self::Only | Self::Last) }
}

/// A (pure) matrix product state of a register of qubits.
///
/// Sites are stored contiguously and addressed by position; all bond
/// dimensions are recorded on the sites themselves. Cloning produces a fully
/// independent deep copy.
#[derive(Clone, PartialEq)]
pub struct MPS {
    // Number of qubits.
    pub(crate) n: usize, // ≥ 1
    // Tensors for each qubit. Site `k` has axis signature
    //   [ u{k - 1}, s{k}, u{k} ]
    // with dim(u{-1}) == dim(u{n - 1}) == 1.
    pub(crate) data: Vec<Site>, // length n
    // Orthogonality center, if the chain is known to be in mixed-canonical
    // form.
    pub(crate) center: Option<usize>,
}

impl MPS {
    /// Initialize by factoring a dense, normalized state vector of `2^n`
    /// amplitudes through a left-to-right sweep of singular value
    /// decompositions.
    ///
    /// No truncation takes place beyond dropping singular values that vanish
    /// to numerical precision, so [`to_dense`][Self::to_dense] reproduces the
    /// input. The result is left-canonical.
    ///
    /// Fails if the length of the vector is not a power of two of at least 2,
    /// or its norm deviates from 1 by more than [`NORM_TOL`].
    pub fn from_dense(state: &[C64]) -> MPSResult<Self> {
        let n = qubit_count(state.len()).ok_or(InvalidLength(state.len()))?;
        let norm: f64 = state.iter().map(|a| a.norm_sqr()).sum::<f64>().sqrt();
        if !norm.is_finite() || (norm - 1.0).abs() > NORM_TOL {
            return Err(NotNormalized(norm));
        }
        if n == 1 {
            let g = na::DMatrix::from_column_slice(2, 1, state);
            let data = vec![Site::new_lfused(1, g)];
            return Ok(Self { n, data, center: Some(0) });
        }

        let mut data: Vec<Site> = Vec::with_capacity(n);
        let mut udim: usize = 1;
        // rows are the current left bond; columns are the remaining physical
        // indices in row-major order, i.e. the next one varies the slowest
        let mut rem: na::DMatrix<C64> =
            na::DMatrix::from_row_slice(1, state.len(), state);
        for _ in 0 .. n - 1 {
            let rest = rem.ncols() / 2;
            // fuse the next physical index with the left bond
            let q =
                na::DMatrix::from_fn(2 * udim, rest, |us, c| {
                    let (u, s) = (us % udim, us / udim);
                    rem[(u, s * rest + c)]
                });
            let schmidt = Schmidt::from_decomp(q, None);
            rem = schmidt.weighted_q();
            data.push(Site::new_lfused(udim, schmidt.u));
            udim = schmidt.rank;
        }
        // final site; `rem` has shape (udim, 2)
        let g = na::DMatrix::from_fn(2 * udim, 1, |us, _| rem[(us % udim, us / udim)]);
        data.push(Site::new_lfused(udim, g));
        Ok(Self { n, data, center: Some(n - 1) })
    }

    /// Return the number of qubits.
    pub fn n(&self) -> usize { self.n }

    /// Return a reference to the `k`-th site tensor, if it exists.
    pub fn site(&self, k: usize) -> Option<&Site> { self.data.get(k) }

    /// Return the position of the `k`-th site in the chain, if it exists.
    pub fn site_kind(&self, k: usize) -> Option<SiteKind> {
        if k >= self.n {
            None
        } else if self.n == 1 {
            Some(SiteKind::Only)
        } else if k == 0 {
            Some(SiteKind::First)
        } else if k == self.n - 1 {
            Some(SiteKind::Last)
        } else {
            Some(SiteKind::Bulk)
        }
    }

    /// Return the current orthogonality center, if the chain is known to be in
    /// mixed-canonical form.
    pub fn center(&self) -> Option<usize> { self.center }

    /// Return the dimension of the bond between the `k`-th and `k + 1`-th
    /// sites.
    pub fn bond_dim(&self, k: usize) -> Option<usize> {
        (k + 1 < self.n).then(|| self.data[k].right)
    }

    /// Return the dimensions of all `n - 1` internal bonds.
    pub fn bond_dims(&self) -> Vec<usize> {
        self.data.iter().take(self.n - 1).map(|site| site.right).collect()
    }

    /// Return the maximum bond dimension in the MPS.
    ///
    /// This function will always return `Some` if `self` comprises at least two
    /// qubits.
    pub fn max_bond_dim(&self) -> Option<usize> {
        self.bond_dims().into_iter().max()
    }

    /// Perform an orthogonalization sweep via QR decompositions.
    ///
    /// The represented state is unchanged.
    pub fn canonicalize(&mut self, direction: Direction) -> &mut Self {
        match direction {
            Direction::Left => {
                for k in 0 .. self.n - 1 {
                    let site = mem::take(&mut self.data[k]);
                    let left = site.left;
                    let qr = site.data.qr();
                    let (q, r) = (qr.q(), qr.r());
                    self.data[k] = Site::new_lfused(left, q);
                    let next = mem::take(&mut self.data[k + 1]);
                    self.data[k + 1] = Site::from_rfused(r * next.into_rfused());
                }
                self.center = Some(self.n - 1);
            },
            Direction::Right => {
                for k in (1 .. self.n).rev() {
                    // A_u<sv> = R^† Q^† with Q^† a row-isometry
                    let site = mem::take(&mut self.data[k]);
                    let qr = site.into_rfused().adjoint().qr();
                    let (q, r) = (qr.q(), qr.r());
                    self.data[k] = Site::from_rfused(q.adjoint());
                    let prev = mem::take(&mut self.data[k - 1]);
                    let left = prev.left;
                    self.data[k - 1] =
                        Site::new_lfused(left, prev.data * r.adjoint());
                }
                self.center = Some(0);
            },
        }
        self
    }

    /// Truncate every bond to dimension at most `max_bond` (clipped to at least
    /// 1) by a right-canonicalization followed by a left-to-right sweep of
    /// truncated singular value decompositions.
    ///
    /// The result is left-canonical and is *not* renormalized, so any weight
    /// lost to truncation shows up as a norm below 1.
    pub fn compress(&mut self, max_bond: usize) -> &mut Self {
        let chi = max_bond.max(1);
        if self.n == 1 { return self; }
        self.canonicalize(Direction::Right);
        for k in 0 .. self.n - 1 {
            let site = mem::take(&mut self.data[k]);
            let left = site.left;
            let schmidt = Schmidt::from_decomp(site.data, Some(chi));
            let carry = schmidt.weighted_q();
            self.data[k] = Site::new_lfused(left, schmidt.u);
            let next = mem::take(&mut self.data[k + 1]);
            self.data[k + 1] = Site::from_rfused(carry * next.into_rfused());
        }
        self.center = Some(self.n - 1);
        self
    }

    /// Compute the norm of the state by contracting ⟨ψ∣ψ⟩ site by site.
    pub fn norm(&self) -> f64 {
        let e: na::DMatrix<C64> =
            self.data.iter()
            .fold(na::DMatrix::from_element(1, 1, C64::one()), |e, site| {
                let e0 = site.slice(0).adjoint() * &e * site.slice(0);
                let e1 = site.slice(1).adjoint() * &e * site.slice(1);
                e0 + e1
            });
        e[(0, 0)].re.max(0.0).sqrt()
    }

    /// Rescale the state to unit norm.
    ///
    /// The scaling is absorbed into the orthogonality center if there is one.
    /// Does nothing if the norm is zero.
    pub fn normalize(&mut self) -> &mut Self {
        let norm = self.norm();
        if norm > 0.0 && norm.is_finite() {
            let k = self.center.unwrap_or(self.n - 1);
            self.data[k].data.scale_mut(norm.recip());
        }
        self
    }

    /// Apply a 2×2 unitary to the physical index of the `k`-th site.
    ///
    /// The arrangement of the elements of `op` should correspond to the usual
    /// left-matrix-multiplication view of operator application. `op` is not
    /// checked for unitarity. No bond dimension changes.
    pub fn apply_single_site_gate(&mut self, op: &na::DMatrix<C64>, k: usize)
        -> MPSResult<&mut Self>
    {
        if k >= self.n { return Err(SiteOutOfBounds { site: k, n: self.n }); }
        if op.shape() != (2, 2) { return Err(OperatorIncompatibleShape); }
        self.data[k].apply_op(op);
        Ok(self)
    }

    /// Apply a 4×4 unitary to the `k`-th and `k + 1`-th sites, then split the
    /// result back into two site tensors by singular value decomposition.
    ///
    /// `op` acts on the fused index `2·s{k} + s{k + 1}`, i.e. site `k` is the
    /// more significant of the two. The shared bond keeps every singular value
    /// that does not vanish numerically and so may grow; use
    /// [`compress`][Self::compress] afterward to re-truncate.
    pub fn apply_two_site_gate(&mut self, op: &na::DMatrix<C64>, k: usize)
        -> MPSResult<&mut Self>
    {
        if k + 1 >= self.n {
            return Err(SiteOutOfBounds { site: k + 1, n: self.n });
        }
        if op.shape() != (4, 4) { return Err(OperatorIncompatibleShape); }
        let lsite = mem::take(&mut self.data[k]);
        let rsite = mem::take(&mut self.data[k + 1]);
        let l = lsite.left;
        let r = rsite.right;
        // rows are `u + l·s{k}`; columns are `s{k + 1} + 2·w`
        let theta = lsite.data * rsite.into_rfused();
        let gated =
            na::DMatrix::from_fn(2 * l, 2 * r, |us, sw| {
                let (u, s1) = (us % l, us / l);
                let (s2, w) = (sw % 2, sw / 2);
                (0..2).cartesian_product(0..2)
                    .map(|(t1, t2)| {
                        op[(2 * s1 + s2, 2 * t1 + t2)]
                            * theta[(u + l * t1, t2 + 2 * w)]
                    })
                    .sum::<C64>()
            });
        let schmidt = Schmidt::from_decomp(gated, None);
        let carry = schmidt.weighted_q();
        self.data[k] = Site::new_lfused(l, schmidt.u);
        self.data[k + 1] = Site::from_rfused(carry);
        self.center =
            match self.center {
                Some(c) if c == k || c == k + 1 => Some(k + 1),
                _ => None,
            };
        Ok(self)
    }

    /// Apply a register-level [`Gate`], mapping its qubits onto sites.
    ///
    /// Qubit `q` lives on site `n - 1 - q`. Supported gates act on a single
    /// qubit or on two adjacent qubits listed in increasing order.
    pub fn apply_gate(&mut self, gate: &Gate) -> MPSResult<&mut Self> {
        let n = self.n;
        match *gate.qubits() {
            [q] if q < n => self.apply_single_site_gate(gate.mat(), n - 1 - q),
            // the second qubit is the more significant one, and sits on the
            // site to the left of the first
            [q0, q1] if q1 == q0 + 1 && q1 < n =>
                self.apply_two_site_gate(gate.mat(), n - 1 - q1),
            _ => Err(UnsupportedGate(gate.qubits().to_vec())),
        }
    }

    /// Contract the entire chain into a dense state vector of `2^n` amplitudes.
    ///
    /// The runtime and memory cost is exponential in `n`; this is meant for
    /// diagnostics on small registers.
    pub fn to_dense(&self) -> na::DVector<C64> {
        let acc: na::DMatrix<C64> =
            self.data.iter()
            .fold(na::DMatrix::from_element(1, 1, C64::one()), |acc, site| {
                let m = acc.nrows();
                let parts = [&acc * site.slice(0), &acc * site.slice(1)];
                na::DMatrix::from_fn(2 * m, site.right, |ps, v| {
                    parts[ps % 2][(ps / 2, v)]
                })
            });
        na::DVector::from_iterator(acc.nrows(), acc.column(0).iter().copied())
    }

    /// Compute the overlap ⟨0…0∣ψ⟩ by contracting only the `s = 0` slices of
    /// each site.
    ///
    /// Equal to the first element of [`to_dense`][Self::to_dense], but linear
    /// in `n`.
    pub fn overlap_zero(&self) -> C64 {
        let acc: na::DMatrix<C64> =
            self.data.iter()
            .fold(na::DMatrix::from_element(1, 1, C64::one()), |acc, site| {
                acc * site.slice(0)
            });
        acc[(0, 0)]
    }
}

impl fmt::Debug for MPS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MPS")
            .field("n", &self.n)
            .field("bonds", &self.bond_dims())
            .field("center", &self.center)
            .finish()
    }
}

impl fmt::Display for MPS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, site) in self.data.iter().enumerate() {
            let (u, s, v) = site.dims();
            write!(f, "A[{}] :: {{ <{}>, q{}<{}>, <{}> }}", k, u, self.n - 1 - k, s, v)?;
            if Some(k) == self.center { write!(f, " *")?; }
            if k < self.n - 1 { writeln!(f)?; }
        }
        Ok(())
    }
}
