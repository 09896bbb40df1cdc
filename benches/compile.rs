use divan::Bencher;
use siml::{compile_str, CompilerOptions, Evaluator};

fn main() {
    divan::main();
}

/// A process with `n` chained algebraic variables feeding one state each.
fn chain_model(n: usize) -> String {
    let decls = (0..n).map(|i| format!("a{i}, x{i}")).collect::<Vec<_>>().join(", ");
    let equations = (0..n)
        .rev()
        .map(|i| {
            if i == 0 {
                "a0 = k * x0; $x0 = -a0;".to_string()
            } else {
                format!("a{i} = a{} + x{i}; $x{i} = -a{i} * k;", i - 1)
            }
        })
        .collect::<Vec<_>>()
        .join("\n");
    let init = (0..n).map(|i| format!("x{i} = 1;")).collect::<Vec<_>>().join(" ");
    format!(
        "process Chain {{
            data {decls}: Real;
            data k: Real parameter;
            func dynamic() {{ {equations} }}
            func init() {{ k = 0.5; {init} }}
        }}"
    )
}

#[divan::bench(consts = [1, 10, 100, 1000])]
fn compile_chain<const N: usize>(bencher: Bencher) {
    let text = chain_model(N);
    let options = CompilerOptions::default();
    bencher.bench_local(|| {
        let unit = compile_str(&text, &options).unwrap();
        assert!(unit.success());
    });
}

#[divan::bench(consts = [1, 10, 100, 1000])]
fn rhs_chain<const N: usize>(bencher: Bencher) {
    let text = chain_model(N);
    let evaluator = Evaluator::from_siml_str(&text, "Chain").unwrap();
    let mut data = evaluator.get_new_data();
    let mut u = vec![0.0; N];
    evaluator.set_u0(u.as_mut_slice(), data.as_mut_slice());
    let mut rr = vec![0.0; N];
    let t = 0.0;

    bencher.bench_local(|| {
        evaluator.rhs(t, &u, &mut data, &mut rr);
    });
}
