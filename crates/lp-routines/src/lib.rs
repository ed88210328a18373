#![forbid(unsafe_code)]

//! Uniform procedural interface over the routines under test.
//!
//! A routine receives a [`Call`]: scalar dimensions, option flags, and named
//! buffers ([`Slot`]) that it overwrites in place. It returns a LAPACK-style
//! status: `0` on success, `-k` when the `k`-th argument is illegal, and a
//! positive algorithm-specific condition otherwise.
//!
//! Two implementations of every routine live in this crate. They solve the
//! same problems with different kernels and algorithm variants so their
//! outputs agree mathematically but not bit-for-bit.

mod blas;
mod band;
mod cholesky;
mod kernels;
mod lu;
mod nonsymmetric;
mod qr;
mod svd;
mod symmetric;
mod tridiagonal;
pub mod workspace;

use core::fmt;

use lp_fixture::{Fixture, Precision, Real, Uplo};
use serde::{Deserialize, Serialize};

pub const STATUS_REASON_CODES: [&str; 3] = [
    "status_success",
    "status_illegal_argument",
    "status_algorithm_condition",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Implementation {
    Reference,
    Candidate,
}

impl Implementation {
    pub const ALL: [Self; 2] = [Self::Reference, Self::Candidate];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reference => "reference",
            Self::Candidate => "candidate",
        }
    }

    /// Run `routine` on `call`, returning its status code.
    pub fn invoke<T: Real>(self, routine: Routine, call: &mut Call<T>) -> i32 {
        match routine {
            Routine::Gemm => blas::gemm(self, call),
            Routine::Gbmv => blas::gbmv(self, call),
            Routine::Spmv => blas::spmv(self, call),
            Routine::Lange => blas::lange(self, call),
            Routine::Getrf => lu::getrf(self, call),
            Routine::Getrs => lu::getrs(self, call),
            Routine::Gecon => lu::gecon(self, call),
            Routine::Gbtrf => band::gbtrf(self, call),
            Routine::Gbtrs => band::gbtrs(self, call),
            Routine::Gbrfs => band::gbrfs(self, call),
            Routine::Potrf => cholesky::potrf(self, call),
            Routine::Potrs => cholesky::potrs(self, call),
            Routine::Pptrf => cholesky::pptrf(self, call),
            Routine::Gtsv => tridiagonal::gtsv(self, call),
            Routine::Syev => symmetric::syev(self, call),
            Routine::Spev => symmetric::spev(self, call),
            Routine::Sbev => symmetric::sbev(self, call),
            Routine::Geqrf => qr::geqrf(self, call),
            Routine::Orgqr => qr::orgqr(self, call),
            Routine::Gelsy => qr::gelsy(self, call),
            Routine::Gesvd => svd::gesvd(self, call),
            Routine::Geev => nonsymmetric::geev(self, call),
            Routine::Ggev => nonsymmetric::ggev(self, call),
        }
    }
}

impl fmt::Display for Implementation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Routine {
    Gemm,
    Gbmv,
    Spmv,
    Lange,
    Getrf,
    Getrs,
    Gecon,
    Gbtrf,
    Gbtrs,
    Gbrfs,
    Potrf,
    Potrs,
    Pptrf,
    Gtsv,
    Syev,
    Spev,
    Sbev,
    Geqrf,
    Orgqr,
    Gelsy,
    Gesvd,
    Geev,
    Ggev,
}

impl Routine {
    pub const ALL: [Self; 23] = [
        Self::Gemm,
        Self::Gbmv,
        Self::Spmv,
        Self::Lange,
        Self::Getrf,
        Self::Getrs,
        Self::Gecon,
        Self::Gbtrf,
        Self::Gbtrs,
        Self::Gbrfs,
        Self::Potrf,
        Self::Potrs,
        Self::Pptrf,
        Self::Gtsv,
        Self::Syev,
        Self::Spev,
        Self::Sbev,
        Self::Geqrf,
        Self::Orgqr,
        Self::Gelsy,
        Self::Gesvd,
        Self::Geev,
        Self::Ggev,
    ];

    #[must_use]
    pub fn base_name(self) -> &'static str {
        match self {
            Self::Gemm => "gemm",
            Self::Gbmv => "gbmv",
            Self::Spmv => "spmv",
            Self::Lange => "lange",
            Self::Getrf => "getrf",
            Self::Getrs => "getrs",
            Self::Gecon => "gecon",
            Self::Gbtrf => "gbtrf",
            Self::Gbtrs => "gbtrs",
            Self::Gbrfs => "gbrfs",
            Self::Potrf => "potrf",
            Self::Potrs => "potrs",
            Self::Pptrf => "pptrf",
            Self::Gtsv => "gtsv",
            Self::Syev => "syev",
            Self::Spev => "spev",
            Self::Sbev => "sbev",
            Self::Geqrf => "geqrf",
            Self::Orgqr => "orgqr",
            Self::Gelsy => "gelsy",
            Self::Gesvd => "gesvd",
            Self::Geev => "geev",
            Self::Ggev => "ggev",
        }
    }

    /// Precision-prefixed name, e.g. `dgbrfs`.
    #[must_use]
    pub fn name(self, precision: Precision) -> String {
        format!("{}{}", precision.prefix(), self.base_name())
    }

    /// Whether `lwork = -1` asks the routine for its optimal workspace.
    #[must_use]
    pub fn supports_workspace_query(self) -> bool {
        matches!(
            self,
            Self::Syev | Self::Geqrf | Self::Orgqr | Self::Gelsy | Self::Gesvd | Self::Geev | Self::Ggev
        )
    }

    /// Buffers the routine reads or writes for the given options.
    #[must_use]
    pub fn required_slots(self, options: &Options) -> Vec<Slot> {
        let vectors = |job: Job, slot: Slot| (job == Job::Vectors).then_some(slot);
        let mut slots = match self {
            Self::Gemm => vec![Slot::A, Slot::B, Slot::C],
            Self::Gbmv => vec![Slot::Ab, Slot::X, Slot::Y],
            Self::Spmv => vec![Slot::Ap, Slot::X, Slot::Y],
            Self::Lange => vec![Slot::A, Slot::Anorm],
            Self::Getrf => vec![Slot::A, Slot::Ipiv],
            Self::Getrs => vec![Slot::A, Slot::Ipiv, Slot::B],
            Self::Gecon => vec![Slot::A, Slot::Anorm, Slot::Rcond, Slot::Work, Slot::Iwork],
            Self::Gbtrf => vec![Slot::Ab, Slot::Ipiv],
            Self::Gbtrs => vec![Slot::Ab, Slot::Ipiv, Slot::B],
            Self::Gbrfs => vec![
                Slot::Ab,
                Slot::Afb,
                Slot::Ipiv,
                Slot::B,
                Slot::X,
                Slot::Ferr,
                Slot::Berr,
                Slot::Work,
                Slot::Iwork,
            ],
            Self::Potrf => vec![Slot::A],
            Self::Potrs => vec![Slot::A, Slot::B],
            Self::Pptrf => vec![Slot::Ap],
            Self::Gtsv => vec![Slot::T, Slot::B],
            Self::Syev => vec![Slot::A, Slot::W, Slot::Work],
            Self::Spev => vec![Slot::Ap, Slot::W, Slot::Work],
            Self::Sbev => vec![Slot::Ab, Slot::W, Slot::Work],
            Self::Geqrf => vec![Slot::A, Slot::Tau, Slot::Work],
            Self::Orgqr => vec![Slot::A, Slot::Tau, Slot::Work],
            Self::Gelsy => vec![Slot::A, Slot::B, Slot::Jpvt, Slot::Rank, Slot::Work],
            Self::Gesvd => vec![Slot::A, Slot::S, Slot::Work],
            Self::Geev => vec![Slot::A, Slot::W, Slot::Wi, Slot::Work],
            Self::Ggev => vec![
                Slot::A,
                Slot::B,
                Slot::Alphar,
                Slot::Alphai,
                Slot::Beta,
                Slot::Work,
            ],
        };
        let extra = match self {
            Self::Spev | Self::Sbev => vectors(options.jobz, Slot::Z),
            Self::Gesvd => vectors(options.jobu, Slot::U),
            _ => None,
        };
        slots.extend(extra);
        if self == Self::Gesvd {
            slots.extend(vectors(options.jobvt, Slot::Vt));
        }
        slots
    }
}

impl fmt::Display for Routine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.base_name())
    }
}

/// Named argument buffer of a [`Call`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    A,
    B,
    C,
    Ab,
    Afb,
    Ap,
    T,
    X,
    Y,
    W,
    Wi,
    Z,
    S,
    U,
    Vt,
    Tau,
    Work,
    Ferr,
    Berr,
    Anorm,
    Rcond,
    Alphar,
    Alphai,
    Beta,
    Saved,
    Ipiv,
    Iwork,
    Jpvt,
    Rank,
}

impl Slot {
    pub const ALL: [Self; 29] = [
        Self::A,
        Self::B,
        Self::C,
        Self::Ab,
        Self::Afb,
        Self::Ap,
        Self::T,
        Self::X,
        Self::Y,
        Self::W,
        Self::Wi,
        Self::Z,
        Self::S,
        Self::U,
        Self::Vt,
        Self::Tau,
        Self::Work,
        Self::Ferr,
        Self::Berr,
        Self::Anorm,
        Self::Rcond,
        Self::Alphar,
        Self::Alphai,
        Self::Beta,
        Self::Saved,
        Self::Ipiv,
        Self::Iwork,
        Self::Jpvt,
        Self::Rank,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "a",
            Self::B => "b",
            Self::C => "c",
            Self::Ab => "ab",
            Self::Afb => "afb",
            Self::Ap => "ap",
            Self::T => "t",
            Self::X => "x",
            Self::Y => "y",
            Self::W => "w",
            Self::Wi => "wi",
            Self::Z => "z",
            Self::S => "s",
            Self::U => "u",
            Self::Vt => "vt",
            Self::Tau => "tau",
            Self::Work => "work",
            Self::Ferr => "ferr",
            Self::Berr => "berr",
            Self::Anorm => "anorm",
            Self::Rcond => "rcond",
            Self::Alphar => "alphar",
            Self::Alphai => "alphai",
            Self::Beta => "beta",
            Self::Saved => "saved",
            Self::Ipiv => "ipiv",
            Self::Iwork => "iwork",
            Self::Jpvt => "jpvt",
            Self::Rank => "rank",
        }
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        matches!(self, Self::Ipiv | Self::Iwork | Self::Jpvt | Self::Rank)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trans {
    #[default]
    No,
    Transpose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Job {
    #[default]
    NoVectors,
    Vectors,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    #[default]
    One,
    Infinity,
    Max,
    Frobenius,
}

/// Scalar dimension arguments. Signed so illegal values can be passed
/// through to the routine and reported as negative statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Dims {
    pub m: i32,
    pub n: i32,
    pub k: i32,
    pub kl: i32,
    pub ku: i32,
    pub kd: i32,
    pub nrhs: i32,
}

impl Dims {
    #[must_use]
    pub fn square(n: usize) -> Self {
        let n = to_dim(n);
        Self {
            m: n,
            n,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_rhs(mut self, nrhs: usize) -> Self {
        self.nrhs = to_dim(nrhs);
        self
    }
}

#[must_use]
pub fn to_dim(value: usize) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    pub trans: Trans,
    pub trans_b: Trans,
    pub uplo: Uplo,
    pub jobz: Job,
    pub jobu: Job,
    pub jobvt: Job,
    pub norm: Norm,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            trans: Trans::No,
            trans_b: Trans::No,
            uplo: Uplo::Upper,
            jobz: Job::NoVectors,
            jobu: Job::NoVectors,
            jobvt: Job::NoVectors,
            norm: Norm::One,
        }
    }
}

/// Floating-point scalar arguments, stored wide and narrowed per call.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Scalars {
    pub alpha: f64,
    pub beta: f64,
    /// Rank-detection threshold for `gelsy`.
    pub rcond: f64,
}

/// Arguments of one routine invocation.
#[derive(Debug, Clone, Default)]
pub struct Call<T> {
    pub dims: Dims,
    pub options: Options,
    pub scalars: Scalars,
    /// `-1` requests a workspace query.
    pub lwork: i32,
    pub a: Option<Fixture<T>>,
    pub b: Option<Fixture<T>>,
    pub c: Option<Fixture<T>>,
    pub ab: Option<Fixture<T>>,
    pub afb: Option<Fixture<T>>,
    pub ap: Option<Fixture<T>>,
    pub t: Option<Fixture<T>>,
    pub x: Option<Fixture<T>>,
    pub y: Option<Fixture<T>>,
    pub w: Option<Fixture<T>>,
    pub wi: Option<Fixture<T>>,
    pub z: Option<Fixture<T>>,
    pub s: Option<Fixture<T>>,
    pub u: Option<Fixture<T>>,
    pub vt: Option<Fixture<T>>,
    pub tau: Option<Fixture<T>>,
    pub work: Option<Fixture<T>>,
    pub ferr: Option<Fixture<T>>,
    pub berr: Option<Fixture<T>>,
    pub anorm: Option<Fixture<T>>,
    pub rcond: Option<Fixture<T>>,
    pub alphar: Option<Fixture<T>>,
    pub alphai: Option<Fixture<T>>,
    pub beta: Option<Fixture<T>>,
    pub saved: Option<Fixture<T>>,
    pub ipiv: Option<Vec<i32>>,
    pub iwork: Option<Vec<i32>>,
    pub jpvt: Option<Vec<i32>>,
    pub rank: Option<Vec<i32>>,
}

impl<T: Real> Call<T> {
    #[must_use]
    pub fn new(dims: Dims, options: Options) -> Self {
        Self {
            dims,
            options,
            ..Self::default()
        }
    }

    fn real_cell(&mut self, slot: Slot) -> Option<&mut Option<Fixture<T>>> {
        let cell = match slot {
            Slot::A => &mut self.a,
            Slot::B => &mut self.b,
            Slot::C => &mut self.c,
            Slot::Ab => &mut self.ab,
            Slot::Afb => &mut self.afb,
            Slot::Ap => &mut self.ap,
            Slot::T => &mut self.t,
            Slot::X => &mut self.x,
            Slot::Y => &mut self.y,
            Slot::W => &mut self.w,
            Slot::Wi => &mut self.wi,
            Slot::Z => &mut self.z,
            Slot::S => &mut self.s,
            Slot::U => &mut self.u,
            Slot::Vt => &mut self.vt,
            Slot::Tau => &mut self.tau,
            Slot::Work => &mut self.work,
            Slot::Ferr => &mut self.ferr,
            Slot::Berr => &mut self.berr,
            Slot::Anorm => &mut self.anorm,
            Slot::Rcond => &mut self.rcond,
            Slot::Alphar => &mut self.alphar,
            Slot::Alphai => &mut self.alphai,
            Slot::Beta => &mut self.beta,
            Slot::Saved => &mut self.saved,
            Slot::Ipiv | Slot::Iwork | Slot::Jpvt | Slot::Rank => return None,
        };
        Some(cell)
    }

    fn int_cell(&mut self, slot: Slot) -> Option<&mut Option<Vec<i32>>> {
        match slot {
            Slot::Ipiv => Some(&mut self.ipiv),
            Slot::Iwork => Some(&mut self.iwork),
            Slot::Jpvt => Some(&mut self.jpvt),
            Slot::Rank => Some(&mut self.rank),
            _ => None,
        }
    }

    #[must_use]
    pub fn real(&self, slot: Slot) -> Option<&Fixture<T>> {
        match slot {
            Slot::A => self.a.as_ref(),
            Slot::B => self.b.as_ref(),
            Slot::C => self.c.as_ref(),
            Slot::Ab => self.ab.as_ref(),
            Slot::Afb => self.afb.as_ref(),
            Slot::Ap => self.ap.as_ref(),
            Slot::T => self.t.as_ref(),
            Slot::X => self.x.as_ref(),
            Slot::Y => self.y.as_ref(),
            Slot::W => self.w.as_ref(),
            Slot::Wi => self.wi.as_ref(),
            Slot::Z => self.z.as_ref(),
            Slot::S => self.s.as_ref(),
            Slot::U => self.u.as_ref(),
            Slot::Vt => self.vt.as_ref(),
            Slot::Tau => self.tau.as_ref(),
            Slot::Work => self.work.as_ref(),
            Slot::Ferr => self.ferr.as_ref(),
            Slot::Berr => self.berr.as_ref(),
            Slot::Anorm => self.anorm.as_ref(),
            Slot::Rcond => self.rcond.as_ref(),
            Slot::Alphar => self.alphar.as_ref(),
            Slot::Alphai => self.alphai.as_ref(),
            Slot::Beta => self.beta.as_ref(),
            Slot::Saved => self.saved.as_ref(),
            Slot::Ipiv | Slot::Iwork | Slot::Jpvt | Slot::Rank => None,
        }
    }

    #[must_use]
    pub fn int(&self, slot: Slot) -> Option<&[i32]> {
        match slot {
            Slot::Ipiv => self.ipiv.as_deref(),
            Slot::Iwork => self.iwork.as_deref(),
            Slot::Jpvt => self.jpvt.as_deref(),
            Slot::Rank => self.rank.as_deref(),
            _ => None,
        }
    }

    #[must_use]
    pub fn has(&self, slot: Slot) -> bool {
        if slot.is_integer() {
            self.int(slot).is_some()
        } else {
            self.real(slot).is_some()
        }
    }

    /// Store a real buffer; returns `false` if `slot` holds integers.
    pub fn set_real(&mut self, slot: Slot, fixture: Fixture<T>) -> bool {
        match self.real_cell(slot) {
            Some(cell) => {
                *cell = Some(fixture);
                true
            }
            None => false,
        }
    }

    /// Store an integer buffer; returns `false` if `slot` holds reals.
    pub fn set_int(&mut self, slot: Slot, values: Vec<i32>) -> bool {
        match self.int_cell(slot) {
            Some(cell) => {
                *cell = Some(values);
                true
            }
            None => false,
        }
    }

    /// Exchange the contents of two slots of the same element type.
    /// Used to bind a routine's formal argument to a differently named buffer.
    pub fn swap_slots(&mut self, lhs: Slot, rhs: Slot) -> bool {
        if lhs == rhs {
            return true;
        }
        if lhs.is_integer() != rhs.is_integer() {
            return false;
        }
        if lhs.is_integer() {
            let left = self.int_cell(lhs).and_then(Option::take);
            let right = self.int_cell(rhs).and_then(Option::take);
            if let Some(cell) = self.int_cell(lhs) {
                *cell = right;
            }
            if let Some(cell) = self.int_cell(rhs) {
                *cell = left;
            }
        } else {
            let left = self.real_cell(lhs).and_then(Option::take);
            let right = self.real_cell(rhs).and_then(Option::take);
            if let Some(cell) = self.real_cell(lhs) {
                *cell = right;
            }
            if let Some(cell) = self.real_cell(rhs) {
                *cell = left;
            }
        }
        true
    }
}

/// Coarse meaning of a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "class", content = "index", rename_all = "snake_case")]
pub enum StatusClass {
    Success,
    IllegalArgument(u32),
    Condition(u32),
}

impl StatusClass {
    #[must_use]
    pub fn from_info(info: i32) -> Self {
        match info {
            0 => Self::Success,
            i if i < 0 => Self::IllegalArgument(i.unsigned_abs()),
            i => Self::Condition(i.unsigned_abs()),
        }
    }

    #[must_use]
    pub fn reason_code(self) -> &'static str {
        match self {
            Self::Success => "status_success",
            Self::IllegalArgument(_) => "status_illegal_argument",
            Self::Condition(_) => "status_algorithm_condition",
        }
    }
}
