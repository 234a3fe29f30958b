//! Concrete evaluation scenarios for leaves and composites.

mod common;

use std::sync::Arc;

use common::*;
use matfree::{
    Backend, BlockDiag, CsrHost, DenseMatrix, Dtype, HStack, HostArray, KronI, OpRef, Operator,
    OperatorExt, SpMatrix, SparseHost, UnscaledFFT, VStack,
};

fn sp_identity(backend: &Arc<dyn matfree::Backend>, n: usize, name: &str) -> OpRef {
    Arc::new(
        SpMatrix::new(
            Arc::clone(backend),
            SparseHost::Csr(CsrHost::identity(n)),
            name,
        )
        .unwrap(),
    )
}

#[test]
fn csr_identity_passes_input_through() {
    let b = backend();
    let a = sp_identity(&b, 3, "I");
    let x = upload(&b, (3, 1), vec![c(1.0, 0.0), c(2.0, 0.0), c(3.0, 0.0)]);
    let y = eval_forward(&a, &x);
    assert_allclose(&y.to_host(), &x.to_host(), 0.0);
}

#[test]
fn dense_permutation_swaps_and_is_self_adjoint() {
    let b = backend();
    let m = HostArray::from_vec(
        (2, 2),
        vec![re(0.0), re(1.0), re(1.0), re(0.0)],
    )
    .unwrap();
    let a: OpRef = Arc::new(DenseMatrix::new(Arc::clone(&b), m, "P").unwrap());
    let x = upload(&b, (2, 1), vec![c(1.0, 2.0), c(3.0, -1.0)]);

    let y = eval_forward(&a, &x);
    assert_allclose(&y.to_host(), &[c(3.0, -1.0), c(1.0, 2.0)], 0.0);

    let z = eval_adjoint(&a, &x);
    assert_allclose(&z.to_host(), &y.to_host(), 0.0);
}

#[test]
fn vstack_duplicates_forward_and_sums_adjoint() {
    let b = backend();
    let a: OpRef = Arc::new(
        VStack::new(vec![sp_identity(&b, 2, "top"), sp_identity(&b, 2, "bot")], "V").unwrap(),
    );
    assert_eq!(a.shape(), (4, 2));

    let x = upload(&b, (2, 1), vec![re(1.0), re(2.0)]);
    let y = eval_forward(&a, &x);
    assert_allclose(&y.to_host(), &[re(1.0), re(2.0), re(1.0), re(2.0)], 0.0);

    let w = upload(&b, (4, 1), vec![re(1.0), re(2.0), re(3.0), re(4.0)]);
    let z = eval_adjoint(&a, &w);
    assert_allclose(&z.to_host(), &[re(4.0), re(6.0)], 0.0);
}

#[test]
fn product_honors_alpha_beta_through_the_chain() {
    let b = backend();
    // D: 2x3 dense, S: 3x4 sparse
    let d_host = HostArray::from_vec(
        (2, 3),
        vec![re(1.0), re(0.0), re(0.0), re(1.0), c(0.0, 1.0), re(2.0)],
    )
    .unwrap();
    let s_host = CsrHost::new(
        (3, 4),
        vec![re(2.0), c(0.0, -1.0), re(1.0), re(3.0)],
        vec![0, 3, 1, 2],
        vec![0, 2, 3, 4],
    )
    .unwrap();

    let d: OpRef = Arc::new(DenseMatrix::new(Arc::clone(&b), d_host.clone(), "D").unwrap());
    let s: OpRef = Arc::new(
        SpMatrix::new(Arc::clone(&b), SparseHost::Csr(s_host.clone()), "S").unwrap(),
    );
    let a = d.times(Arc::clone(&s)).unwrap();
    assert_eq!(a.shape(), (2, 4));

    let xv: Vec<matfree::c32> = (1..=4).map(|v| c(v as f32, 0.5)).collect();
    let x = upload(&b, (4, 1), xv.clone());
    let y0 = vec![re(1.0); 2];
    let y = upload(&b, (2, 1), y0.clone());
    a.eval(&y, &x, re(2.0), re(3.0), true).unwrap();

    // reference: 2 * D * (S * x) + 3 * ones
    let mut sx = vec![c(0.0, 0.0); 3];
    for i in 0..3 {
        for p in s_host.indptr[i] as usize..s_host.indptr[i + 1] as usize {
            sx[i] += s_host.data[p] * xv[s_host.indices[p] as usize];
        }
    }
    let mut want = vec![c(0.0, 0.0); 2];
    for i in 0..2 {
        for k in 0..3 {
            want[i] += d_host.get(i, k) * sx[k];
        }
        want[i] = re(2.0) * want[i] + re(3.0) * y0[i];
    }
    assert_allclose(&y.to_host(), &want, 1e-5);
}

#[test]
fn kroni_applies_block_copies_by_reshape() {
    let b = backend();
    // M: 2x3
    let m = CsrHost::new(
        (2, 3),
        vec![re(1.0), re(2.0), re(3.0)],
        vec![0, 2, 1],
        vec![0, 2, 3],
    )
    .unwrap();
    let leaf: OpRef = Arc::new(
        SpMatrix::new(Arc::clone(&b), SparseHost::Csr(m.clone()), "M").unwrap(),
    );
    let a: OpRef = Arc::new(KronI::new(2, Arc::clone(&leaf), "K").unwrap());
    assert_eq!(a.shape(), (4, 6));

    let xv: Vec<matfree::c32> = (1..=6).map(|v| c(v as f32, -(v as f32))).collect();
    let x = upload(&b, (6, 1), xv.clone());
    let y = eval_forward(&a, &x);

    let halves = [&xv[0..3], &xv[3..6]];
    let mut want = Vec::new();
    for half in halves {
        for i in 0..2 {
            let mut acc = c(0.0, 0.0);
            for p in m.indptr[i] as usize..m.indptr[i + 1] as usize {
                acc += m.data[p] * half[m.indices[p] as usize];
            }
            want.push(acc);
        }
    }
    assert_allclose(&y.to_host(), &want, 1e-6);
}

#[test]
fn blockdiag_leaves_other_blocks_untouched() {
    let b = backend();
    let two = HostArray::from_vec((1, 1), vec![re(2.0)]).unwrap();
    let three = HostArray::from_vec((1, 1), vec![re(3.0)]).unwrap();
    let a: OpRef = Arc::new(
        BlockDiag::new(
            vec![
                Arc::new(DenseMatrix::new(Arc::clone(&b), two, "two").unwrap()) as OpRef,
                Arc::new(DenseMatrix::new(Arc::clone(&b), three, "three").unwrap()) as OpRef,
            ],
            "B",
        )
        .unwrap(),
    );
    let x = upload(&b, (2, 1), vec![re(1.0), re(1.0)]);
    let y = eval_forward(&a, &x);
    assert_allclose(&y.to_host(), &[re(2.0), re(3.0)], 0.0);

    // off-block input does not leak
    let x2 = upload(&b, (2, 1), vec![re(0.0), re(5.0)]);
    let y2 = eval_forward(&a, &x2);
    assert_allclose(&y2.to_host(), &[re(0.0), re(15.0)], 0.0);
}

#[test]
fn single_child_stacks_behave_like_the_child() {
    let b = backend();
    let child = sp_identity(&b, 3, "I");
    let v: OpRef = Arc::new(VStack::new(vec![Arc::clone(&child)], "").unwrap());
    let h: OpRef = Arc::new(HStack::new(vec![Arc::clone(&child)], "").unwrap());
    assert_eq!(v.shape(), child.shape());
    assert_eq!(h.shape(), child.shape());

    let x = upload(&b, (3, 2), (1..=6).map(|v| re(v as f32)).collect());
    for op in [&v, &h] {
        let y = eval_forward(op, &x);
        assert_allclose(&y.to_host(), &x.to_host(), 0.0);
        let z = eval_adjoint(op, &x);
        assert_allclose(&z.to_host(), &x.to_host(), 0.0);
    }
}

#[test]
fn hstack_concatenates_along_columns() {
    let b = backend();
    let a: OpRef = Arc::new(
        HStack::new(vec![sp_identity(&b, 2, "l"), sp_identity(&b, 2, "r")], "H").unwrap(),
    );
    assert_eq!(a.shape(), (2, 4));

    // forward: sum of the two halves
    let x = upload(&b, (4, 1), vec![re(1.0), re(2.0), re(10.0), re(20.0)]);
    let y = eval_forward(&a, &x);
    assert_allclose(&y.to_host(), &[re(11.0), re(22.0)], 0.0);

    // adjoint: duplicate into both halves
    let w = upload(&b, (2, 1), vec![re(7.0), re(8.0)]);
    let z = eval_adjoint(&a, &w);
    assert_allclose(
        &z.to_host(),
        &[re(7.0), re(8.0), re(7.0), re(8.0)],
        0.0,
    );
}

#[test]
fn apply_host_uploads_evaluates_downloads() {
    let b = backend();
    let a = sp_identity(&b, 2, "I");
    let doubled = a
        .times(Arc::new(
            DenseMatrix::new(
                Arc::clone(&b),
                HostArray::from_vec((2, 2), vec![re(2.0), re(0.0), re(0.0), re(2.0)]).unwrap(),
                "2I",
            )
            .unwrap(),
        ))
        .unwrap();
    let x = HostArray::from_vec((2, 1), vec![re(1.0), re(4.0)]).unwrap();
    let y = doubled.apply_host(&x).unwrap();
    assert_eq!(y.shape(), (2, 1));
    assert_allclose(y.data(), &[re(2.0), re(8.0)], 0.0);
}

#[test]
fn dump_of_a_nested_tree() {
    let b = backend();
    let fft: OpRef = Arc::new(UnscaledFFT::new(Arc::clone(&b), [2, 2, 1], "F").unwrap());
    let s = sp_identity(&b, 4, "interp");
    let p = fft.times(s).unwrap();
    let k: OpRef = Arc::new(KronI::new(3, p, "K").unwrap());
    let text = k.dump();
    let expected = "\
K, KronI, (12, 12), complex64
|   F*interp, Product, (4, 4), complex64
|   |   F, UnscaledFFT, (4, 4), complex64
|   |   interp, SpMatrix, (4, 4), complex64
";
    assert_eq!(text, expected);
}

#[test]
fn eval_checks_input_width_against_direction() {
    let b = backend();
    let d: OpRef = Arc::new(
        DenseMatrix::new(Arc::clone(&b), HostArray::zeros((3, 2)), "D").unwrap(),
    );
    let x3 = b.zero_array((3, 1), Dtype::Complex64);
    let x2 = b.zero_array((2, 1), Dtype::Complex64);
    let y3 = b.zero_array((3, 1), Dtype::Complex64);
    let y2 = b.zero_array((2, 1), Dtype::Complex64);
    // forward wants x of height 2
    assert!(d.eval(&y3, &x2, re(1.0), re(0.0), true).is_ok());
    assert!(d.eval(&y3, &x3, re(1.0), re(0.0), true).is_err());
    // adjoint wants x of height 3
    assert!(d.eval(&y2, &x3, re(1.0), re(0.0), false).is_ok());
    assert!(d.eval(&y2, &x2, re(1.0), re(0.0), false).is_err());
}
