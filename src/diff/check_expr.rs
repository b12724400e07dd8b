//! Check-constraint expression equivalence
//!
//! Engines rewrite CHECK expressions when storing them: `status IN
//! ('a','b')` comes back as `(status)::text = ANY (ARRAY['a'::text,
//! 'b'::text])`, keywords change case, and redundant parentheses appear.
//! Comparing the raw text would produce spurious ALTERs on every pull, so
//! equality here goes through the PostgreSQL parser: enum-like value-set
//! expressions are folded to (column, sorted values) first, everything
//! else is parsed and compared through the deparser, and only when the
//! parser rejects both sides does a normalized textual comparison run.

use once_cell::sync::Lazy;
use pg_query::NodeEnum;
use regex::Regex;

/// Compare two CHECK expressions for semantic equality.
pub fn checks_equal(a: &str, b: &str) -> bool {
    // Enum-like shapes compare as value sets regardless of spelling.
    if let (Some((col_a, mut vals_a)), Some((col_b, mut vals_b))) =
        (extract_enum_values(a), extract_enum_values(b))
    {
        vals_a.sort();
        vals_b.sort();
        return col_a == col_b && vals_a == vals_b;
    }

    // AST comparison via parse + deparse.
    match (canonical_form(a), canonical_form(b)) {
        (Some(ca), Some(cb)) => ca == cb,
        // Parser rejected at least one side; fall back to text.
        _ => normalize_check_text(a) == normalize_check_text(b),
    }
}

/// Columns referenced by a CHECK expression, AST-extracted.
///
/// Returns a sorted, deduplicated list; empty when the expression does
/// not parse.
pub fn referenced_columns(expr: &str) -> Vec<String> {
    let sql = format!("SELECT 1 WHERE {expr}");
    let Ok(result) = pg_query::parse(&sql) else {
        return Vec::new();
    };

    let mut refs = Vec::new();
    if let Some(raw) = result.protobuf.stmts.first()
        && let Some(stmt) = raw.stmt.as_ref()
        && let Some(NodeEnum::SelectStmt(select)) = stmt.node.as_ref()
        && let Some(where_clause) = select.where_clause.as_ref()
    {
        walk_for_column_refs(where_clause, &mut refs);
    }
    refs.sort();
    refs.dedup();
    refs
}

/// The single column a CHECK constrains, when it constrains exactly one.
///
/// Falls back to the naming heuristic (`<table>_<column>_check`) when
/// the expression does not parse.
pub fn constrained_column(expr: &str, constraint_name: Option<&str>, table: &str) -> Option<String> {
    let refs = referenced_columns(expr);
    if refs.len() == 1 {
        return Some(refs.into_iter().next().unwrap());
    }
    if !refs.is_empty() {
        return None;
    }
    column_from_constraint_name(constraint_name?, table)
}

/// `orders_status_check` on table `orders` → `status`.
pub fn column_from_constraint_name(constraint_name: &str, table: &str) -> Option<String> {
    let stripped = constraint_name
        .strip_prefix(table)?
        .strip_prefix('_')?
        .strip_suffix("_check")
        .or_else(|| constraint_name.strip_prefix(table)?.strip_prefix('_')?.strip_suffix("_chk"))?;
    if stripped.is_empty() {
        None
    } else {
        Some(stripped.to_string())
    }
}

/// Extract `(column, values)` from enum-like expressions:
/// `col IN ('a', 'b')` and `(col)::text = ANY (ARRAY['a'::text, …])`.
pub fn extract_enum_values(expr: &str) -> Option<(String, Vec<String>)> {
    let sql = format!("SELECT 1 WHERE {expr}");
    let result = pg_query::parse(&sql).ok()?;

    let raw = result.protobuf.stmts.first()?;
    let stmt = raw.stmt.as_ref()?;
    let NodeEnum::SelectStmt(select) = stmt.node.as_ref()? else {
        return None;
    };
    let where_clause = select.where_clause.as_ref()?;

    enum_shape_of(where_clause)
}

/// Match the two enum-like AST shapes on an expression node.
fn enum_shape_of(node: &pg_query::protobuf::Node) -> Option<(String, Vec<String>)> {
    let NodeEnum::AExpr(expr) = node.node.as_ref()? else {
        return None;
    };

    use pg_query::protobuf::AExprKind;
    let kind = expr.kind();
    let column = column_name_of(expr.lexpr.as_deref()?)?;

    match kind {
        // col IN ('a', 'b', 'c') — rexpr is a List of constants.
        AExprKind::AexprIn => {
            let rexpr = expr.rexpr.as_deref()?;
            let NodeEnum::List(list) = rexpr.node.as_ref()? else {
                return None;
            };
            let values: Option<Vec<String>> = list.items.iter().map(string_const_of).collect();
            Some((column, values?))
        }
        // (col)::text = ANY (ARRAY['a'::text, …]) — rexpr is an array expression.
        AExprKind::AexprOpAny => {
            let rexpr = expr.rexpr.as_deref()?;
            let NodeEnum::AArrayExpr(arr) = rexpr.node.as_ref()? else {
                return None;
            };
            let values: Option<Vec<String>> = arr.elements.iter().map(string_const_of).collect();
            Some((column, values?))
        }
        _ => None,
    }
}

/// Column name from a ColumnRef, looking through casts and parentheses.
fn column_name_of(node: &pg_query::protobuf::Node) -> Option<String> {
    match node.node.as_ref()? {
        NodeEnum::ColumnRef(cr) => {
            let last = cr.fields.last()?;
            match last.node.as_ref()? {
                NodeEnum::String(s) => Some(s.sval.clone()),
                _ => None,
            }
        }
        NodeEnum::TypeCast(tc) => column_name_of(tc.arg.as_deref()?),
        _ => None,
    }
}

/// String constant value, looking through casts.
fn string_const_of(node: &pg_query::protobuf::Node) -> Option<String> {
    match node.node.as_ref()? {
        NodeEnum::AConst(c) => {
            use pg_query::protobuf::a_const::Val;
            match c.val.as_ref()? {
                Val::Sval(s) => Some(s.sval.clone()),
                Val::Ival(i) => Some(i.ival.to_string()),
                Val::Fval(f) => Some(f.fval.clone()),
                Val::Boolval(b) => Some(b.boolval.to_string()),
                Val::Bsval(b) => Some(b.bsval.clone()),
            }
        }
        NodeEnum::TypeCast(tc) => string_const_of(tc.arg.as_deref()?),
        _ => None,
    }
}

/// Parse + deparse an expression to a canonical spelling. `None` when the
/// parser rejects it.
fn canonical_form(expr: &str) -> Option<String> {
    let sql = format!("SELECT 1 WHERE {expr}");
    let result = pg_query::parse(&sql).ok()?;
    let deparsed = pg_query::deparse(&result.protobuf).ok()?;
    deparsed
        .strip_prefix("SELECT 1 WHERE ")
        .map(|s| s.to_string())
}

/// Recursively collect column references from an expression AST.
///
/// Covers the node kinds that occur in CHECK expressions: `ColumnRef`,
/// `FuncCall`, `TypeCast`, `A_Expr`, `BoolExpr`, `CaseExpr`, `CaseWhen`,
/// `CoalesceExpr`, `NullTest`, `MinMaxExpr`, `AArrayExpr`, `List`.
fn walk_for_column_refs(node: &pg_query::protobuf::Node, refs: &mut Vec<String>) {
    let Some(inner) = &node.node else {
        return;
    };

    match inner {
        NodeEnum::ColumnRef(cr) => {
            if let Some(last) = cr.fields.last()
                && let Some(NodeEnum::String(s)) = &last.node
            {
                refs.push(s.sval.clone());
            }
        }
        NodeEnum::FuncCall(fc) => {
            for arg in &fc.args {
                walk_for_column_refs(arg, refs);
            }
        }
        NodeEnum::TypeCast(tc) => {
            if let Some(arg) = &tc.arg {
                walk_for_column_refs(arg, refs);
            }
        }
        NodeEnum::AExpr(expr) => {
            if let Some(lexpr) = &expr.lexpr {
                walk_for_column_refs(lexpr, refs);
            }
            if let Some(rexpr) = &expr.rexpr {
                walk_for_column_refs(rexpr, refs);
            }
        }
        NodeEnum::BoolExpr(be) => {
            for arg in &be.args {
                walk_for_column_refs(arg, refs);
            }
        }
        NodeEnum::CaseExpr(ce) => {
            if let Some(arg) = &ce.arg {
                walk_for_column_refs(arg, refs);
            }
            for when in &ce.args {
                walk_for_column_refs(when, refs);
            }
            if let Some(def) = &ce.defresult {
                walk_for_column_refs(def, refs);
            }
        }
        NodeEnum::CaseWhen(cw) => {
            if let Some(expr) = &cw.expr {
                walk_for_column_refs(expr, refs);
            }
            if let Some(result) = &cw.result {
                walk_for_column_refs(result, refs);
            }
        }
        NodeEnum::CoalesceExpr(ce) => {
            for arg in &ce.args {
                walk_for_column_refs(arg, refs);
            }
        }
        NodeEnum::NullTest(nt) => {
            if let Some(arg) = &nt.arg {
                walk_for_column_refs(arg, refs);
            }
        }
        NodeEnum::MinMaxExpr(mm) => {
            for arg in &mm.args {
                walk_for_column_refs(arg, refs);
            }
        }
        NodeEnum::AArrayExpr(arr) => {
            for elem in &arr.elements {
                walk_for_column_refs(elem, refs);
            }
        }
        NodeEnum::List(list) => {
            for item in &list.items {
                walk_for_column_refs(item, refs);
            }
        }
        // Constants and other nodes — no column references.
        _ => {}
    }
}

static IN_LIST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bin\s*\(([^()]*)\)").unwrap());
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static CAST_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"::\s*[a-zA-Z_][a-zA-Z0-9_ ]*(\[\])*").unwrap());

/// Last-resort textual normalization: lowercase, strip casts, collapse
/// whitespace, drop wrapping parens, sort IN value sets.
fn normalize_check_text(expr: &str) -> String {
    let mut s = crate::normalize::normalize_default(expr).to_lowercase();
    s = CAST_RE.replace_all(&s, "").to_string();
    s = WS_RE.replace_all(&s, " ").trim().to_string();

    s = IN_LIST_RE
        .replace_all(&s, |caps: &regex::Captures<'_>| {
            let mut values: Vec<String> = caps[1]
                .split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect();
            values.sort();
            format!("in ({})", values.join(", "))
        })
        .to_string();

    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_vs_any_array_equivalence() {
        let local = "status IN ('a','b','c')";
        let remote = "(status)::text = ANY (ARRAY['a'::text, 'b'::text, 'c'::text])";
        assert!(checks_equal(local, remote));
    }

    #[test]
    fn test_value_set_order_is_significant_only_as_set() {
        assert!(checks_equal(
            "status IN ('b','a')",
            "status IN ('a','b')"
        ));
        assert!(!checks_equal(
            "status IN ('a','b')",
            "status IN ('a','b','c')"
        ));
    }

    #[test]
    fn test_different_columns_not_equal() {
        assert!(!checks_equal(
            "status IN ('a','b')",
            "state IN ('a','b')"
        ));
    }

    #[test]
    fn test_reformatting_is_equal() {
        assert!(checks_equal("(amount > 0)", "amount > 0"));
        assert!(checks_equal("amount   >   0", "AMOUNT > 0"));
        assert!(checks_equal(
            "(price > 0 AND price < 1000)",
            "price > 0 and price < 1000"
        ));
    }

    #[test]
    fn test_semantically_different_not_equal() {
        assert!(!checks_equal("amount > 0", "amount >= 0"));
        assert!(!checks_equal("amount > 0", "amount > 1"));
    }

    #[test]
    fn test_referenced_columns() {
        assert_eq!(referenced_columns("amount > 0"), vec!["amount"]);
        assert_eq!(
            referenced_columns("start_at < end_at AND amount > 0"),
            vec!["amount", "end_at", "start_at"]
        );
        assert_eq!(
            referenced_columns("length(trim(name)) > 0"),
            vec!["name"]
        );
        assert!(referenced_columns("not ] valid sql [").is_empty());
    }

    #[test]
    fn test_constrained_column_single() {
        assert_eq!(
            constrained_column("status IN ('a','b')", None, "orders"),
            Some("status".to_string())
        );
        assert_eq!(
            constrained_column("start_at < end_at", None, "orders"),
            None,
            "two columns means no single constrained column"
        );
    }

    #[test]
    fn test_constraint_name_heuristic() {
        assert_eq!(
            column_from_constraint_name("orders_status_check", "orders"),
            Some("status".to_string())
        );
        assert_eq!(
            column_from_constraint_name("orders_check", "orders"),
            None
        );
        assert_eq!(
            column_from_constraint_name("other_status_check", "orders"),
            None
        );
    }

    #[test]
    fn test_extract_enum_values_in_form() {
        let (col, values) = extract_enum_values("status IN ('a','b')").unwrap();
        assert_eq!(col, "status");
        assert_eq!(values, vec!["a", "b"]);
    }

    #[test]
    fn test_extract_enum_values_any_form() {
        let (col, values) =
            extract_enum_values("(status)::text = ANY (ARRAY['x'::text, 'y'::text])").unwrap();
        assert_eq!(col, "status");
        assert_eq!(values, vec!["x", "y"]);
    }

    #[test]
    fn test_extract_enum_values_rejects_non_enum() {
        assert!(extract_enum_values("amount > 0").is_none());
        assert!(extract_enum_values("status IN (other_col, 'a')").is_none());
    }

    #[test]
    fn test_unparseable_falls_back_to_text() {
        // Identical garbage is equal, different garbage is not.
        assert!(checks_equal("@@nonsense@@", "@@nonsense@@"));
        assert!(!checks_equal("@@nonsense@@", "@@different@@"));
    }
}
