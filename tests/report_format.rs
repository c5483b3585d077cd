//! Report-format tests: the line-oriented output layout, property ordering,
//! and the single-line record forms.

use macrolens::analysis::analyze_source;
use macrolens::VirtualLoader;

fn render(src: &str) -> String {
    analyze_source("main.c", Some("/virtual/main.c"), src, &VirtualLoader::new(), &[])
        .expect("analysis failed")
        .render()
}

#[test]
fn top_level_block_layout() {
    let out = render(
        "#define ADD(a,b) ((a)+(b))\n\
         int x = ADD(1, 2);\n",
    );
    assert!(out.contains("Top level invocation\t{\n"));
    assert!(out.contains("    \"Name\" : \"ADD\",\n"));
    assert!(out.contains("    \"DefinitionLocation\" : \"/virtual/main.c:1:9\",\n"));
    assert!(out.contains("    \"TypeSignature\" : \"int(int, int)\",\n"));
    assert!(out.contains("    \"InvocationDepth\" : 0,\n"));
    assert!(out.contains("    \"NumASTRoots\" : 1,\n"));
    assert!(out.contains("    \"NumArguments\" : 2,\n"));
    assert!(out.contains("    \"IsObjectLike\" : false,\n"));
    // The last boolean entry carries no trailing comma.
    assert!(out.contains("    \"IsAnyArgumentNotAnExpression\" : false\n }\n"));
}

#[test]
fn property_order_is_fixed() {
    let out = render(
        "#define ZERO 0\n\
         int a[ZERO];\n",
    );
    let keys = [
        "\"Name\"",
        "\"DefinitionLocation\"",
        "\"InvocationLocation\"",
        "\"ASTKind\"",
        "\"TypeSignature\"",
        "\"InvocationDepth\"",
        "\"NumASTRoots\"",
        "\"NumArguments\"",
        "\"HasStringification\"",
        "\"HasTokenPasting\"",
        "\"HasAlignedArguments\"",
        "\"HasSameNameAsOtherDeclaration\"",
        "\"DoesExpansionHaveControlFlowStmt\"",
        "\"IsHygienic\"",
        "\"IsExpansionICE\"",
        "\"IsInvokedWhereICERequired\"",
        "\"IsAnyArgumentNotAnExpression\"",
    ];
    let mut last = 0;
    for key in keys {
        let pos = out.find(key).unwrap_or_else(|| panic!("missing key {}", key));
        assert!(pos > last, "key {} out of order", key);
        last = pos;
    }
}

#[test]
fn single_line_records() {
    let out = render(
        "#define ONE 1\n\
         #define TWO (ONE + ONE)\n\
         #ifdef ONE\n\
         int z = TWO;\n\
         #endif\n",
    );
    assert!(out.contains("Definition ONE true /virtual/main.c:1:9\n"));
    assert!(out.contains("Definition __LINE__ false File without FileEntry\n"));
    assert!(out.contains("InspectedByCPP ONE\n"));
    assert!(out.contains("Nested Invocation ONE\n"));
}

#[test]
fn include_lines_precede_expansion_records() {
    let out = render_with_header();
    let include_pos = out.find("Include true /virtual/h.h").expect("include line");
    let invocation_pos = out.find("Top level invocation").expect("invocation record");
    assert!(include_pos < invocation_pos);
}

fn render_with_header() -> String {
    let mut loader = VirtualLoader::new();
    loader.add("h.h", "#define FROM_HEADER 7\n");
    analyze_source(
        "main.c",
        Some("/virtual/main.c"),
        "#include \"h.h\"\nint x = FROM_HEADER;\n",
        &loader,
        &[],
    )
    .expect("analysis failed")
    .render()
}
