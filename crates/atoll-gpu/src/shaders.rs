//! WGSL compute shader for the dense complex matrix product.
//!
//! Uses the `enable f64;` extension; doubles travel through storage
//! buffers as `vec2<u32>` bitcasts. Matrices are column-major with
//! interleaved real/imaginary parts, matching the host layout.

/// C = A·B for complex double matrices, one thread per output element.
pub const ZGEMM_F64: &str = r#"
enable f64;

struct Dims { m: u32, k: u32, n: u32, _pad: u32 }

@group(0) @binding(0) var<uniform> dims: Dims;
@group(0) @binding(1) var<storage, read> a: array<vec2<u32>>;
@group(0) @binding(2) var<storage, read> b: array<vec2<u32>>;
@group(0) @binding(3) var<storage, read_write> c: array<vec2<u32>>;

@compute @workgroup_size(16, 16)
fn main(@builtin(global_invocation_id) gid: vec3<u32>) {
    let row = gid.x;
    let col = gid.y;
    if (row >= dims.m || col >= dims.n) {
        return;
    }

    var sum_re: f64 = 0.0;
    var sum_im: f64 = 0.0;
    for (var p = 0u; p < dims.k; p++) {
        let ia = 2u * (p * dims.m + row);
        let ib = 2u * (col * dims.k + p);
        let ar = bitcast<f64>(a[ia]);
        let ai = bitcast<f64>(a[ia + 1u]);
        let br = bitcast<f64>(b[ib]);
        let bi = bitcast<f64>(b[ib + 1u]);
        sum_re += ar * br - ai * bi;
        sum_im += ar * bi + ai * br;
    }

    let ic = 2u * (col * dims.m + row);
    c[ic] = bitcast<vec2<u32>>(sum_re);
    c[ic + 1u] = bitcast<vec2<u32>>(sum_im);
}
"#;
