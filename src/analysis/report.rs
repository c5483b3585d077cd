//! Report emitter.
//!
//! One record per top-level expansion, serialized as a JSON-style object
//! on one logical block, with the property order fixed; plus single-line
//! records for nested invocations, macro definitions, names inspected by
//! the preprocessor, and include directives.

use std::fmt::Write as _;

/// The full property set of one top-level expansion, in report order.
#[derive(Debug, Default, Clone)]
pub struct InvocationRecord {
    // String properties
    pub name: String,
    pub definition_location: String,
    pub invocation_location: String,
    pub ast_kind: String,
    pub type_signature: String,

    // Integer properties
    pub invocation_depth: u32,
    pub num_ast_roots: usize,
    pub num_arguments: usize,

    // Boolean properties
    pub has_stringification: bool,
    pub has_token_pasting: bool,
    pub has_aligned_arguments: bool,
    pub has_same_name_as_other_declaration: bool,

    pub does_expansion_have_control_flow_stmt: bool,

    pub does_body_reference_macro_defined_after_macro: bool,
    pub does_body_reference_decl_declared_after_macro: bool,
    pub does_body_contain_decl_ref_expr: bool,
    pub does_subexpression_expanded_from_body_have_local_type: bool,
    pub does_subexpression_expanded_from_body_have_type_defined_after_macro: bool,

    pub does_any_argument_have_side_effects: bool,
    pub does_any_argument_contain_decl_ref_expr: bool,

    pub is_hygienic: bool,
    pub is_definition_location_valid: bool,
    pub is_invocation_location_valid: bool,
    pub is_object_like: bool,
    pub is_invoked_in_macro_argument: bool,
    pub is_name_present_in_cpp_conditional: bool,
    pub is_expansion_ice: bool,

    pub is_expansion_type_null: bool,
    pub is_expansion_type_anonymous: bool,
    pub is_expansion_type_local_type: bool,
    pub is_expansion_type_defined_after_macro: bool,
    pub is_expansion_type_void: bool,

    pub is_any_argument_type_null: bool,
    pub is_any_argument_type_anonymous: bool,
    pub is_any_argument_type_local_type: bool,
    pub is_any_argument_type_defined_after_macro: bool,
    pub is_any_argument_type_void: bool,

    pub is_invoked_where_modifiable_value_required: bool,
    pub is_invoked_where_addressable_value_required: bool,
    pub is_invoked_where_ice_required: bool,

    pub is_any_argument_expanded_where_modifiable_value_required: bool,
    pub is_any_argument_expanded_where_addressable_value_required: bool,
    pub is_any_argument_conditionally_evaluated: bool,
    pub is_any_argument_never_expanded: bool,
    pub is_any_argument_not_an_expression: bool,
}

impl InvocationRecord {
    fn string_entries(&self) -> Vec<(&'static str, &str)> {
        vec![
            ("Name", &self.name),
            ("DefinitionLocation", &self.definition_location),
            ("InvocationLocation", &self.invocation_location),
            ("ASTKind", &self.ast_kind),
            ("TypeSignature", &self.type_signature),
        ]
    }

    fn int_entries(&self) -> Vec<(&'static str, i64)> {
        vec![
            ("InvocationDepth", self.invocation_depth as i64),
            ("NumASTRoots", self.num_ast_roots as i64),
            ("NumArguments", self.num_arguments as i64),
        ]
    }

    fn bool_entries(&self) -> Vec<(&'static str, bool)> {
        vec![
            ("HasStringification", self.has_stringification),
            ("HasTokenPasting", self.has_token_pasting),
            ("HasAlignedArguments", self.has_aligned_arguments),
            ("HasSameNameAsOtherDeclaration", self.has_same_name_as_other_declaration),
            ("DoesExpansionHaveControlFlowStmt", self.does_expansion_have_control_flow_stmt),
            (
                "DoesBodyReferenceMacroDefinedAfterMacro",
                self.does_body_reference_macro_defined_after_macro,
            ),
            (
                "DoesBodyReferenceDeclDeclaredAfterMacro",
                self.does_body_reference_decl_declared_after_macro,
            ),
            ("DoesBodyContainDeclRefExpr", self.does_body_contain_decl_ref_expr),
            (
                "DoesSubexpressionExpandedFromBodyHaveLocalType",
                self.does_subexpression_expanded_from_body_have_local_type,
            ),
            (
                "DoesSubexpressionExpandedFromBodyHaveTypeDefinedAfterMacro",
                self.does_subexpression_expanded_from_body_have_type_defined_after_macro,
            ),
            ("DoesAnyArgumentHaveSideEffects", self.does_any_argument_have_side_effects),
            ("DoesAnyArgumentContainDeclRefExpr", self.does_any_argument_contain_decl_ref_expr),
            ("IsHygienic", self.is_hygienic),
            ("IsDefinitionLocationValid", self.is_definition_location_valid),
            ("IsInvocationLocationValid", self.is_invocation_location_valid),
            ("IsObjectLike", self.is_object_like),
            ("IsInvokedInMacroArgument", self.is_invoked_in_macro_argument),
            ("IsNamePresentInCPPConditional", self.is_name_present_in_cpp_conditional),
            ("IsExpansionICE", self.is_expansion_ice),
            ("IsExpansionTypeNull", self.is_expansion_type_null),
            ("IsExpansionTypeAnonymous", self.is_expansion_type_anonymous),
            ("IsExpansionTypeLocalType", self.is_expansion_type_local_type),
            ("IsExpansionTypeDefinedAfterMacro", self.is_expansion_type_defined_after_macro),
            ("IsExpansionTypeVoid", self.is_expansion_type_void),
            ("IsAnyArgumentTypeNull", self.is_any_argument_type_null),
            ("IsAnyArgumentTypeAnonymous", self.is_any_argument_type_anonymous),
            ("IsAnyArgumentTypeLocalType", self.is_any_argument_type_local_type),
            (
                "IsAnyArgumentTypeDefinedAfterMacro",
                self.is_any_argument_type_defined_after_macro,
            ),
            ("IsAnyArgumentTypeVoid", self.is_any_argument_type_void),
            (
                "IsInvokedWhereModifiableValueRequired",
                self.is_invoked_where_modifiable_value_required,
            ),
            (
                "IsInvokedWhereAddressableValueRequired",
                self.is_invoked_where_addressable_value_required,
            ),
            ("IsInvokedWhereICERequired", self.is_invoked_where_ice_required),
            (
                "IsAnyArgumentExpandedWhereModifiableValueRequired",
                self.is_any_argument_expanded_where_modifiable_value_required,
            ),
            (
                "IsAnyArgumentExpandedWhereAddressableValueRequired",
                self.is_any_argument_expanded_where_addressable_value_required,
            ),
            ("IsAnyArgumentConditionallyEvaluated", self.is_any_argument_conditionally_evaluated),
            ("IsAnyArgumentNeverExpanded", self.is_any_argument_never_expanded),
            ("IsAnyArgumentNotAnExpression", self.is_any_argument_not_an_expression),
        ]
    }
}

/// One record of the final report.
#[derive(Debug, Clone)]
pub enum ReportLine {
    Definition { name: String, valid: bool, loc_or_error: String },
    InspectedByCpp { name: String },
    Include { valid: bool, name: String },
    NestedInvocation { name: String },
    InvokedInMacroArgument { name: String },
    TopLevel(Box<InvocationRecord>),
}

/// Render report lines in the documented line-oriented format.
pub fn render(lines: &[ReportLine]) -> String {
    let mut out = String::new();
    for line in lines {
        match line {
            ReportLine::Definition { name, valid, loc_or_error } => {
                let _ = writeln!(out, "Definition {} {} {}", name, valid, loc_or_error);
            }
            ReportLine::InspectedByCpp { name } => {
                let _ = writeln!(out, "InspectedByCPP {}", name);
            }
            ReportLine::Include { valid, name } => {
                let _ = writeln!(out, "Include {} {}", valid, name);
            }
            ReportLine::NestedInvocation { name } => {
                let _ = writeln!(out, "Nested Invocation {}", name);
            }
            ReportLine::InvokedInMacroArgument { name } => {
                let _ = writeln!(out, "Invoked In Macro Argument {}", name);
            }
            ReportLine::TopLevel(record) => {
                let _ = writeln!(out, "Top level invocation\t{{");
                for (key, value) in record.string_entries() {
                    let _ = writeln!(out, "    \"{}\" : \"{}\",", key, value);
                }
                for (key, value) in record.int_entries() {
                    let _ = writeln!(out, "    \"{}\" : {},", key, value);
                }
                let bools = record.bool_entries();
                for (i, (key, value)) in bools.iter().enumerate() {
                    let comma = if i + 1 == bools.len() { "" } else { "," };
                    let _ = writeln!(out, "    \"{}\" : {}{}", key, value, comma);
                }
                let _ = writeln!(out, " }}");
            }
        }
    }
    out
}
