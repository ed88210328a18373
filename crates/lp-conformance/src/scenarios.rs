//! The scenario catalog.
//!
//! Every scenario is built from deterministic generators, so both
//! precisions and both implementations see the same mathematical problem.
//! Scenario ids start with the LAPACK name of the routine whose output is
//! judged, precision prefix included.

use lp_canon::{Category, Rule, VectorLayout};
use lp_fixture::{BandLayout, Fixture, Real, Uplo, generate, packed_len};
use lp_routines::{Call, Dims, Job, Norm, Options, Routine, Scalars, Slot, to_dim};
use lp_tolerance::presets;

use crate::driver::{Plan, Step, Workspace};
use crate::{Scenario, SkipPolicy};

fn scenario<T: Real>(
    routine: Routine,
    case: &str,
    plan: Plan<T>,
    rules: Vec<Rule>,
) -> Scenario<T> {
    Scenario {
        id: format!("{}_{case}", routine.name(T::PRECISION)),
        plan,
        rules,
        skip: SkipPolicy::Never,
    }
}

fn single<T: Real>(routine: Routine, call: Call<T>) -> Plan<T> {
    Plan::new(call, vec![Step::invoke(routine)])
}

fn column_major<T: Real>(rows: usize, cols: usize, values: &[f64]) -> Fixture<T> {
    Fixture::dense(rows, cols, values.iter().copied().map(T::from_f64).collect())
}

#[must_use]
pub fn scenario_catalog<T: Real>() -> Vec<Scenario<T>> {
    let mut catalog = Vec::new();
    catalog.extend(blas_scenarios());
    catalog.extend(lu_scenarios());
    catalog.push(banded_refinement());
    catalog.extend(cholesky_scenarios());
    catalog.push(tridiagonal_solve());
    catalog.extend(symmetric_eigen_scenarios());
    catalog.push(qr_factors());
    catalog.extend(svd_scenarios());
    catalog.extend(nonsymmetric_scenarios());
    catalog.extend(least_squares_scenarios());
    catalog.extend(status_scenarios());
    catalog
}

fn blas_scenarios<T: Real>() -> Vec<Scenario<T>> {
    let mut gemm = Call::new(
        Dims {
            m: 4,
            n: 5,
            k: 3,
            ..Dims::default()
        },
        Options::default(),
    );
    gemm.scalars = Scalars {
        alpha: 1.5,
        beta: 0.5,
        ..Scalars::default()
    };
    gemm.set_real(Slot::A, generate::dense_general(4, 3, 1.0, 0.5, 0.0));
    gemm.set_real(Slot::B, generate::dense_general(3, 5, -0.5, 0.25, 1.0));
    gemm.set_real(Slot::C, generate::rank_one(4, 5, 0.1));

    let (n, kl, ku) = (6, 1, 2);
    let mut gbmv = Call::new(
        Dims {
            m: 6,
            n: 6,
            kl: 1,
            ku: 2,
            ..Dims::default()
        },
        Options::default(),
    );
    gbmv.scalars = Scalars {
        alpha: 1.0,
        beta: 2.0,
        ..Scalars::default()
    };
    gbmv.set_real(
        Slot::Ab,
        generate::diagonally_dominant_band(n, kl, ku).to_band(kl, ku, BandLayout::Plain),
    );
    gbmv.set_real(Slot::X, generate::ramp(n, 1.0));
    gbmv.set_real(Slot::Y, generate::range(n, 0.5));

    let mut spmv = Call::new(
        Dims::square(5),
        Options {
            uplo: Uplo::Lower,
            ..Options::default()
        },
    );
    spmv.scalars = Scalars {
        alpha: 1.0,
        ..Scalars::default()
    };
    spmv.set_real(Slot::Ap, generate::packed_symmetric(5, 3.0, Uplo::Lower));
    spmv.set_real(Slot::X, generate::ramp(5, 0.5));
    spmv.set_real(Slot::Y, Fixture::zeros(5, 1));

    let mut lange = Call::new(
        Dims {
            m: 5,
            n: 4,
            ..Dims::default()
        },
        Options {
            norm: Norm::Frobenius,
            ..Options::default()
        },
    );
    lange.set_real(Slot::A, generate::dense_general(5, 4, 1.0, -0.5, 2.0));
    lange.set_real(Slot::Anorm, Fixture::zeros(1, 1));

    vec![
        scenario(
            Routine::Gemm,
            "scaled_accumulate",
            single(Routine::Gemm, gemm),
            vec![Rule::plain(Slot::C, 4, 5, presets::BLAS_PRODUCT)],
        ),
        scenario(
            Routine::Gbmv,
            "band_product",
            single(Routine::Gbmv, gbmv),
            vec![Rule::vector(Slot::Y, 6, presets::BLAS_PRODUCT)],
        ),
        scenario(
            Routine::Spmv,
            "packed_lower_product",
            single(Routine::Spmv, spmv),
            vec![Rule::vector(Slot::Y, 5, presets::BLAS_PRODUCT)],
        ),
        scenario(
            Routine::Lange,
            "frobenius",
            single(Routine::Lange, lange),
            vec![Rule::vector(Slot::Anorm, 1, presets::BLAS_PRODUCT)],
        ),
    ]
}

fn lu_scenarios<T: Real>() -> Vec<Scenario<T>> {
    let n = 6;
    let mut solve = Call::new(Dims::square(n).with_rhs(2), Options::default());
    solve.set_real(Slot::A, generate::dense_general(n, n, 1.0, 0.5, 20.0));
    solve.set_real(Slot::B, generate::rank_one(n, 2, 1.0));
    solve.ipiv = Some(vec![0; n]);

    let mut condition = Call::new(Dims::square(n), Options::default());
    condition.set_real(Slot::A, generate::dense_general(n, n, 1.0, 0.5, 20.0));
    condition.set_real(Slot::Anorm, Fixture::zeros(1, 1));
    condition.set_real(Slot::Rcond, Fixture::zeros(1, 1));
    condition.ipiv = Some(vec![0; n]);

    vec![
        scenario(
            Routine::Getrs,
            "factor_solve",
            Plan::new(
                solve,
                vec![Step::invoke(Routine::Getrf), Step::invoke(Routine::Getrs)],
            ),
            vec![
                Rule::plain(Slot::B, n, 2, presets::DIRECT_SOLVE),
                Rule::plain(Slot::A, n, n, presets::FACTOR_ENTRIES),
                Rule::discrete(Slot::Ipiv, n),
            ],
        ),
        scenario(
            Routine::Gecon,
            "one_norm_estimate",
            Plan::new(
                condition,
                vec![
                    Step::invoke(Routine::Lange),
                    Step::invoke(Routine::Getrf),
                    Step::invoke(Routine::Gecon),
                ],
            ),
            vec![
                Rule::vector(Slot::Anorm, 1, presets::BLAS_PRODUCT),
                Rule::vector(Slot::Rcond, 1, presets::CONDITION_ESTIMATE),
            ],
        ),
    ]
}

/// Pentadiagonal `n = 5` system: factor, solve, refine.
fn banded_refinement<T: Real>() -> Scenario<T> {
    let (n, kl, ku) = (5, 2, 2);
    let dense = generate::diagonally_dominant_band::<T>(n, kl, ku);
    let dims = Dims {
        kl: 2,
        ku: 2,
        ..Dims::square(n).with_rhs(1)
    };
    let mut call = Call::new(dims, Options::default());
    call.set_real(Slot::Ab, dense.to_band(kl, ku, BandLayout::Plain));
    call.set_real(Slot::Afb, dense.to_band(kl, ku, BandLayout::Factor));
    call.set_real(Slot::B, generate::ramp(n, 1.0));
    call.set_real(Slot::X, Fixture::zeros(n, 1));
    call.set_real(Slot::Ferr, Fixture::zeros(1, 1));
    call.set_real(Slot::Berr, Fixture::zeros(1, 1));
    call.ipiv = Some(vec![0; n]);

    let steps = vec![
        Step::invoke_aliased(Routine::Gbtrf, &[(Slot::Ab, Slot::Afb)]),
        Step::snapshot(Slot::B, Slot::X),
        Step::invoke_aliased(Routine::Gbtrs, &[(Slot::Ab, Slot::Afb), (Slot::B, Slot::X)]),
        Step::invoke(Routine::Gbrfs),
    ];
    scenario(
        Routine::Gbrfs,
        "pentadiagonal_refine",
        Plan::new(call, steps),
        vec![
            Rule::vector(Slot::X, n, presets::DIRECT_SOLVE),
            Rule::new(
                Slot::Berr,
                1,
                1,
                Category::UpperBound,
                presets::BACKWARD_ERROR_ESTIMATE,
            ),
            Rule::vector(Slot::Ferr, 1, presets::FORWARD_ERROR_ESTIMATE),
            Rule::plain(Slot::Afb, 2 * kl + ku + 1, n, presets::FACTOR_ENTRIES),
            Rule::discrete(Slot::Ipiv, n),
        ],
    )
}

fn cholesky_scenarios<T: Real>() -> Vec<Scenario<T>> {
    let n = 6;
    let mut scenarios: Vec<Scenario<T>> = [(Uplo::Upper, "upper_solve"), (Uplo::Lower, "lower_solve")]
        .into_iter()
        .map(|(uplo, case)| {
            let mut call = Call::new(
                Dims::square(n).with_rhs(2),
                Options {
                    uplo,
                    ..Options::default()
                },
            );
            call.set_real(Slot::A, generate::positive_definite(n));
            call.set_real(Slot::B, generate::dense_general(n, 2, 0.5, -1.0, 0.0));
            scenario(
                Routine::Potrs,
                case,
                Plan::new(
                    call,
                    vec![Step::invoke(Routine::Potrf), Step::invoke(Routine::Potrs)],
                ),
                vec![
                    Rule::plain(Slot::B, n, 2, presets::DIRECT_SOLVE),
                    Rule::plain(Slot::A, n, n, presets::FACTOR_ENTRIES),
                ],
            )
        })
        .collect();

    let mut packed = Call::new(Dims::square(5), Options::default());
    packed.set_real(Slot::Ap, generate::packed_symmetric(5, 8.0, Uplo::Upper));
    // packed storage has unit leading dimension: read it as one row
    scenarios.push(scenario(
        Routine::Pptrf,
        "packed_upper",
        single(Routine::Pptrf, packed),
        vec![Rule::plain(Slot::Ap, 1, packed_len(5), presets::FACTOR_ENTRIES)],
    ));
    scenarios
}

fn tridiagonal_solve<T: Real>() -> Scenario<T> {
    let n = 8;
    let mut call = Call::new(Dims::square(n).with_rhs(1), Options::default());
    call.set_real(Slot::T, generate::tridiagonal(n));
    call.set_real(Slot::B, generate::ramp(n, 0.25));
    scenario(
        Routine::Gtsv,
        "symmetric_tridiagonal",
        single(Routine::Gtsv, call),
        vec![Rule::vector(Slot::B, n, presets::DIRECT_SOLVE)],
    )
}

fn eigen_call<T: Real>(a: Fixture<T>, jobz: Job) -> Call<T> {
    let n = a.rows();
    let mut call = Call::new(
        Dims::square(n),
        Options {
            jobz,
            ..Options::default()
        },
    );
    call.set_real(Slot::A, a);
    call.set_real(Slot::W, Fixture::zeros(n, 1));
    call
}

fn symmetric_eigen_scenarios<T: Real>() -> Vec<Scenario<T>> {
    let vector_rules = |n: usize| {
        vec![
            Rule::spectrum(Slot::W, n, presets::SYMMETRIC_SPECTRUM),
            Rule::new(
                Slot::A,
                n,
                n,
                Category::Vectors {
                    values: Slot::W,
                    layout: VectorLayout::Columns,
                },
                presets::EIGENVECTORS,
            ),
        ]
    };

    let hilbert = eigen_call(generate::hilbert(10), Job::NoVectors);
    let tridiagonal = eigen_call(generate::tridiagonal(6).to_dense(), Job::Vectors);
    // rank one: four zero eigenvalues with no canonical eigenbasis
    let degenerate = eigen_call(generate::symmetric(5), Job::Vectors);

    let mut packed = Call::new(Dims::square(6), Options::default());
    packed.set_real(Slot::Ap, generate::packed_symmetric(6, 8.0, Uplo::Upper));
    packed.set_real(Slot::W, Fixture::zeros(6, 1));

    let mut band = Call::new(
        Dims {
            kd: 2,
            ..Dims::square(8)
        },
        Options::default(),
    );
    band.set_real(Slot::Ab, generate::banded_symmetric(8, 2, 4.0, 1.0, Uplo::Upper));
    band.set_real(Slot::W, Fixture::zeros(8, 1));

    vec![
        scenario(
            Routine::Syev,
            "hilbert_values",
            single(Routine::Syev, hilbert).with_workspace(Workspace::Query),
            vec![Rule::spectrum(Slot::W, 10, presets::SYMMETRIC_SPECTRUM)],
        ),
        scenario(
            Routine::Syev,
            "tridiagonal_vectors",
            single(Routine::Syev, tridiagonal),
            vector_rules(6),
        ),
        scenario(
            Routine::Syev,
            "repeated_eigenvalue_vectors",
            single(Routine::Syev, degenerate),
            vector_rules(5),
        ),
        scenario(
            Routine::Spev,
            "packed_values",
            single(Routine::Spev, packed),
            vec![Rule::spectrum(Slot::W, 6, presets::SYMMETRIC_SPECTRUM)],
        ),
        scenario(
            Routine::Sbev,
            "band_values",
            single(Routine::Sbev, band),
            vec![Rule::spectrum(Slot::W, 8, presets::SYMMETRIC_SPECTRUM)],
        ),
    ]
}

fn qr_factors<T: Real>() -> Scenario<T> {
    let (m, n) = (6, 4);
    let mut call = Call::new(
        Dims {
            m: 6,
            n: 4,
            k: 4,
            ..Dims::default()
        },
        Options::default(),
    );
    call.set_real(Slot::A, generate::dense_general(m, n, 1.0, 0.5, 4.0));
    call.set_real(Slot::Tau, Fixture::zeros(n, 1));
    let steps = vec![
        Step::invoke(Routine::Geqrf),
        Step::snapshot(Slot::A, Slot::Saved),
        Step::invoke(Routine::Orgqr),
    ];
    scenario(
        Routine::Orgqr,
        "tall_factors",
        Plan::new(call, steps).with_workspace(Workspace::Query),
        vec![Rule::new(
            Slot::A,
            m,
            n,
            Category::QrFactors {
                r: Slot::Saved,
                input: Slot::A,
            },
            presets::ORTHOGONAL_FACTOR,
        )],
    )
}

fn svd_scenarios<T: Real>() -> Vec<Scenario<T>> {
    let n = 4;
    let mut vectors = Call::new(
        Dims::square(n),
        Options {
            jobu: Job::Vectors,
            jobvt: Job::Vectors,
            ..Options::default()
        },
    );
    vectors.set_real(Slot::A, generate::upper_triangular(n, 1.0, 1.0, 0.2));
    vectors.set_real(Slot::S, Fixture::zeros(n, 1));
    vectors.set_real(Slot::U, Fixture::zeros(n, n));
    vectors.set_real(Slot::Vt, Fixture::zeros(n, n));
    let singular_vectors = |slot: Slot, layout: VectorLayout| {
        Rule::new(
            slot,
            n,
            n,
            Category::Vectors {
                values: Slot::S,
                layout,
            },
            presets::EIGENVECTORS,
        )
    };

    let mut wide = Call::new(
        Dims {
            m: 3,
            n: 5,
            ..Dims::default()
        },
        Options::default(),
    );
    wide.set_real(Slot::A, generate::dense_general(3, 5, 1.0, 0.5, 4.0));
    wide.set_real(Slot::S, Fixture::zeros(3, 1));

    vec![
        scenario(
            Routine::Gesvd,
            "triangular_vectors",
            single(Routine::Gesvd, vectors),
            vec![
                Rule::spectrum(Slot::S, n, presets::SINGULAR_VALUES),
                singular_vectors(Slot::U, VectorLayout::Columns),
                singular_vectors(Slot::Vt, VectorLayout::Rows),
            ],
        ),
        scenario(
            Routine::Gesvd,
            "wide_values",
            single(Routine::Gesvd, wide).with_workspace(Workspace::Query),
            vec![Rule::spectrum(Slot::S, 3, presets::SINGULAR_VALUES)],
        ),
    ]
}

const PENCIL_A: [f64; 16] = [
    4.0, 1.0, 0.0, 0.5, 2.0, 3.0, 1.0, 0.0, 0.0, 0.5, 5.0, 0.3, 0.3, 0.0, 0.2, 2.0,
];
const PENCIL_B: [f64; 16] = [
    3.0, 0.0, 0.0, 0.0, 1.0, 2.0, 0.0, 0.0, 0.5, 0.3, 4.0, 0.0, 0.2, 0.1, 0.5, 1.0,
];

fn pencil_call<T: Real>(a: Fixture<T>, b: Fixture<T>) -> Call<T> {
    let n = a.rows();
    let mut call = Call::new(Dims::square(n), Options::default());
    call.set_real(Slot::A, a);
    call.set_real(Slot::B, b);
    for slot in [Slot::Alphar, Slot::Alphai, Slot::Beta] {
        call.set_real(slot, Fixture::zeros(n, 1));
    }
    call
}

fn nonsymmetric_scenarios<T: Real>() -> Vec<Scenario<T>> {
    let n = 6;
    let mut geev = Call::new(Dims::square(n), Options::default());
    geev.set_real(Slot::A, generate::upper_hessenberg(n));
    geev.set_real(Slot::W, Fixture::zeros(n, 1));
    geev.set_real(Slot::Wi, Fixture::zeros(n, 1));

    let dense_pencil = pencil_call(column_major(4, 4, &PENCIL_A), column_major(4, 4, &PENCIL_B));
    let mut singular_b = generate::upper_triangular::<T>(4, 2.0, 0.0, 0.25);
    singular_b.set(2, 2, T::ZERO);
    let infinite_pencil = pencil_call(generate::upper_triangular(4, 1.0, 1.0, 0.5), singular_b);
    let pairs = || {
        vec![Rule::new(
            Slot::Alphar,
            4,
            1,
            Category::GeneralizedPairs {
                alphai: Slot::Alphai,
                beta: Slot::Beta,
            },
            presets::GENERALIZED_RATIO,
        )]
    };

    vec![
        scenario(
            Routine::Geev,
            "hessenberg_values",
            single(Routine::Geev, geev),
            vec![Rule::new(
                Slot::W,
                n,
                1,
                Category::ComplexSpectrum { imag: Slot::Wi },
                presets::NONSYMMETRIC_SPECTRUM,
            )],
        ),
        scenario(
            Routine::Ggev,
            "upper_triangular_b",
            single(Routine::Ggev, dense_pencil).with_workspace(Workspace::Query),
            pairs(),
        ),
        scenario(
            Routine::Ggev,
            "infinite_eigenvalue",
            single(Routine::Ggev, infinite_pencil),
            pairs(),
        ),
    ]
}

fn least_squares_call<T: Real>(a: Fixture<T>, rcond: f64) -> Call<T> {
    let (m, n) = (a.rows(), a.cols());
    let mut call = Call::new(
        Dims {
            m: to_dim(m),
            n: to_dim(n),
            nrhs: 1,
            ..Dims::default()
        },
        Options::default(),
    );
    call.scalars.rcond = rcond;
    call.set_real(Slot::A, a);
    call.set_real(Slot::B, generate::ramp(m.max(n), 1.0));
    call.jpvt = Some(vec![0; n]);
    call.rank = Some(vec![0]);
    call
}

fn least_squares_scenarios<T: Real>() -> Vec<Scenario<T>> {
    let rules = || {
        vec![
            Rule::plain(Slot::B, 3, 1, presets::LEAST_SQUARES),
            Rule::discrete(Slot::Jpvt, 3),
            Rule::discrete(Slot::Rank, 1),
        ]
    };
    let full_rank = least_squares_call(generate::dense_general(6, 3, 1.0, 0.5, 4.0), 1e-8);

    // third column is the sum of the first two plus a 1% alternating term;
    // its trailing R entry falls between the two implementations' thresholds
    let basis = generate::dense_general::<T>(6, 2, 1.0, 0.5, 4.0);
    let nearly_dependent = Fixture::from_fn(6, 3, |i, j| {
        if j < 2 {
            basis.get(i, j)
        } else {
            let wiggle = if i % 2 == 0 { 0.01 } else { -0.01 };
            basis.get(i, 0) + basis.get(i, 1) + T::from_f64(wiggle)
        }
    });
    let deficient = least_squares_call(nearly_dependent, 5e-4);

    let mut divergent = scenario(
        Routine::Gelsy,
        "rank_threshold",
        single(Routine::Gelsy, deficient).with_workspace(Workspace::Query),
        rules(),
    );
    divergent.skip = SkipPolicy::OnRankDivergence("rank_tolerance_divergence");

    vec![
        scenario(
            Routine::Gelsy,
            "full_rank",
            single(Routine::Gelsy, full_rank).with_workspace(Workspace::Query),
            rules(),
        ),
        divergent,
    ]
}

/// Scenarios whose routines stop with a non-zero status. Only the status
/// is judged.
fn status_scenarios<T: Real>() -> Vec<Scenario<T>> {
    let mut not_definite = Call::new(Dims::square(4), Options::default());
    not_definite.set_real(Slot::A, generate::symmetric(4));

    let mut negative_rows = Call::new(
        Dims {
            m: -1,
            n: 4,
            ..Dims::default()
        },
        Options::default(),
    );
    negative_rows.set_real(Slot::A, generate::dense_general(4, 4, 1.0, 0.5, 2.0));
    negative_rows.ipiv = Some(vec![0; 4]);

    // a legal single-element workspace for the order the routine is told
    let mut negative_order = eigen_call(generate::positive_definite(4), Job::NoVectors);
    negative_order.dims.n = -1;
    negative_order.set_real(Slot::Work, Fixture::zeros(1, 1));
    negative_order.lwork = 1;

    let mut plain_band = Call::new(
        Dims {
            kl: 2,
            ku: 2,
            ..Dims::square(5)
        },
        Options::default(),
    );
    plain_band.set_real(
        Slot::Ab,
        generate::diagonally_dominant_band(5, 2, 2).to_band(2, 2, BandLayout::Plain),
    );
    plain_band.ipiv = Some(vec![0; 5]);

    vec![
        scenario(
            Routine::Potrf,
            "not_positive_definite",
            single(Routine::Potrf, not_definite),
            vec![Rule::plain(Slot::A, 4, 4, presets::FACTOR_ENTRIES)],
        ),
        scenario(
            Routine::Getrf,
            "negative_rows",
            single(Routine::Getrf, negative_rows),
            Vec::new(),
        ),
        scenario(
            Routine::Syev,
            "negative_order",
            single(Routine::Syev, negative_order).with_workspace(Workspace::AsGiven),
            vec![Rule::spectrum(Slot::W, 4, presets::SYMMETRIC_SPECTRUM)],
        ),
        scenario(
            Routine::Gbtrf,
            "plain_band_layout",
            single(Routine::Gbtrf, plain_band),
            Vec::new(),
        ),
    ]
}
