//! Parse/print round-trip: printing a parsed module and re-parsing the
//! output reproduces the same text (anonymous names are re-derived from
//! container order, so text equality implies structural equality).

use tir_parser::parse_module;

fn assert_roundtrip(source: &str) {
    let module = parse_module(source).unwrap_or_else(|e| panic!("parse failed: {e}\n{source}"));
    let printed = module.display().to_string();
    let reparsed = parse_module(&printed)
        .unwrap_or_else(|e| panic!("reparse failed: {e}\n--- printed ---\n{printed}"));
    let reprinted = reparsed.display().to_string();
    assert_eq!(printed, reprinted, "print is not a fixed point");
}

#[test]
fn roundtrips_minimal_module() {
    assert_roundtrip("module \"m\"\nstage raw\n");
}

#[test]
fn roundtrips_single_line_function() {
    assert_roundtrip(
        "module \"m\" \n stage raw \n func @f: (i32) -> i32 { 'entry(%x: i32): return %x: i32 }",
    );
}

#[test]
fn roundtrips_nominal_types() {
    assert_roundtrip(concat!(
        "module \"types\"\nstage optimizable\n",
        "type $Vec = tensor<4 x f32>\n",
        "type $Opaque\n",
        "struct $Pair {\n    #first: i32\n    #second: $Vec\n}\n",
        "enum $Tree {\n    ?leaf\n    ?node($Pair, i64)\n}\n",
        "var @g: *i64\n",
    ));
}

#[test]
fn roundtrips_anonymous_values() {
    assert_roundtrip(concat!(
        "module \"anon\"\nstage raw\n",
        "var @0: i32\n",
        "func @1: (i32) -> i32 {\n",
        "'0(%0^0: i32):\n",
        "    %0.0 = add %0^0: i32, 1: i32\n",
        "    return %0.0: i32\n",
        "}\n",
    ));
}

#[test]
fn roundtrips_control_flow() {
    assert_roundtrip(concat!(
        "module \"cfg\"\nstage raw\n",
        "enum $E {\n    ?a\n    ?b(i32)\n}\n",
        "func @f: (bool, $E) -> i32 {\n",
        "'entry(%c: bool, %e: $E):\n",
        "    conditional %c: bool then 'dispatch(%e: $E) else 'fallback()\n",
        "'dispatch(%v: $E):\n",
        "    branchEnum %v: $E case ?a 'fallback case ?b 'with_payload\n",
        "'fallback():\n",
        "    %z = literal 0: i32\n",
        "    return %z: i32\n",
        "'with_payload(%p: i32):\n",
        "    return %p: i32\n",
        "}\n",
    ));
}

#[test]
fn roundtrips_tensor_and_memory_instructions() {
    assert_roundtrip(concat!(
        "module \"ops\"\nstage raw\n",
        "func @f: (tensor<4x4 x f32>) -> tensor<4x4 x f32> {\n",
        "'entry(%x: tensor<4x4 x f32>):\n",
        "    %n = negate %x: tensor<4x4 x f32>\n",
        "    %s = select %x: tensor<4x4 x f32>, %n: tensor<4x4 x f32> by false: tensor<4x4 x bool>\n",
        "    %r = random 4x4 from 0.0: f32 upto 1.0: f32\n",
        "    %sum = add %s: tensor<4x4 x f32>, %r: tensor<4x4 x f32>\n",
        "    %p = allocateStack tensor<4x4 x f32> count 1\n",
        "    store %sum: tensor<4x4 x f32> to %p: *tensor<4x4 x f32>\n",
        "    %out = load %p: *tensor<4x4 x f32>\n",
        "    return %out: tensor<4x4 x f32>\n",
        "}\n",
    ));
}

#[test]
fn roundtrips_convolution_and_windows() {
    assert_roundtrip(concat!(
        "module \"conv\"\nstage raw\n",
        "func @f: (tensor<1x4x8x8 x f32>, tensor<8x2x3x3 x f32>) -> tensor<1x8x8x8 x f32> {\n",
        "'entry(%img: tensor<1x4x8x8 x f32>, %k: tensor<8x2x3x3 x f32>):\n",
        "    %c = convolve %img: tensor<1x4x8x8 x f32> kernel %k: tensor<8x2x3x3 x f32> strides 1, 1 padding (1, 1), (1, 1) leftDilation 1, 1 rightDilation 1, 1 groups 2\n",
        "    return %c: tensor<1x8x8x8 x f32>\n",
        "}\n",
    ));
}

#[test]
fn roundtrips_declarations() {
    assert_roundtrip(concat!(
        "module \"decl\"\nstage raw\n",
        "[extern] func @blas: (tensor<4 x f32>) -> tensor<4 x f32>\n",
        "!inline\n",
        "func @call: (tensor<4 x f32>) -> tensor<4 x f32> {\n",
        "'entry(%x: tensor<4 x f32>):\n",
        "    %r = apply @blas: (tensor<4 x f32>) -> tensor<4 x f32>(%x: tensor<4 x f32>)\n",
        "    return %r: tensor<4 x f32>\n",
        "}\n",
        "[adjoint @call wrt 0 seedable] func @call_grad: (tensor<4 x f32>, tensor<4 x f32>) -> tensor<4 x f32>\n",
    ));
}
