//! Structural edits recorded as patches and replayed onto a changed base

use pretty_assertions::assert_eq;

use overlay_gen::diff::{apply, apply_strict, diff, ApplyOptions, PatchDocument};
use overlay_gen::parse;
use overlay_gen::structure::{
    deepest, find_all, find_unique_by_kind_and_name, insert, replace, shallowest, DeclKind,
    NodeFilter, NodePredicate, StructureError,
};
use overlay_gen::syntax::SyntaxKind;

const SHOP: &str = "namespace Game
{
    public class Shop
    {
        // Price in coins
        public int Price()
        {
            return 10;
        }

        public int Stock()
        {
            return 3;
        }
    }
}
";

const EDITED: &str = "namespace Game
{
    public class Shop
    {
        // Price in coins
        public int Price()
        {
            return 12;
        }

        public int Stock()
        {
            return 3;
        }

        public int Discount() { return 0; }
    }
}
";

fn edit_shop() -> String {
    let tree = parse(SHOP).expect("Should parse");
    let price = find_unique_by_kind_and_name(&tree.root(), DeclKind::Method, "Price")
        .expect("Should find Price");
    let tree = replace(
        &tree,
        &price,
        "public int Price()\n{\n    return 12;\n}".into(),
    )
    .expect("Should replace");

    let shop = find_unique_by_kind_and_name(&tree.root(), DeclKind::Class, "Shop")
        .expect("Should find Shop");
    insert(&tree, &shop, "public int Discount() { return 0; }".into())
        .expect("Should insert")
        .to_string()
}

#[test]
fn test_edits_keep_formatting() {
    assert_eq!(edit_shop(), EDITED);
}

#[test]
fn test_patch_replays_on_drifted_base() {
    let edited = edit_shop();
    let document = PatchDocument::new("__core__/Shop.cs", "UserCode/Shop.override.cs", diff(SHOP, &edited));
    let parsed = PatchDocument::parse(&document.to_string()).expect("Should parse patch");
    assert_eq!(parsed, document);
    let last = parsed.hunks.last().expect("Should have hunks");
    assert_eq!(last.base_start + last.base_len, SHOP.lines().count());
    assert_eq!(last.patched_start + last.patched_len, edited.lines().count());

    let drifted = format!("using System;\n\n{SHOP}");
    let outcome = apply(&drifted, &parsed.hunks, &ApplyOptions::default());
    assert!(outcome.is_success(), "{:?}", outcome.summaries());
    assert!(outcome.results.iter().all(|r| r.offset == 2));
    assert_eq!(outcome.text(), format!("using System;\n\n{edited}"));
}

#[test]
fn test_identical_sources_give_an_empty_patch() {
    let document = PatchDocument::new("a", "b", diff(SHOP, SHOP));
    assert!(document.hunks.is_empty());
    assert_eq!(document.to_string(), "--- a\n+++ b\n");

    let parsed = PatchDocument::parse(&document.to_string()).expect("Should parse patch");
    let applied = apply_strict(SHOP, &parsed.hunks, &ApplyOptions::default()).expect("Should apply");
    assert_eq!(applied, SHOP);
}

#[test]
fn test_node_moved_by_an_edit_is_stale() {
    let tree = parse(SHOP).expect("Should parse");
    let stock = find_unique_by_kind_and_name(&tree.root(), DeclKind::Method, "Stock")
        .expect("Should find Stock");
    let statement = deepest(&find_all(
        &tree.root(),
        &NodePredicate::new()
            .with_filter(NodeFilter::Statement)
            .with_text("return 10"),
    ))
    .expect("Should find statement");
    assert_eq!(statement.kind(), SyntaxKind::ReturnStatement);

    let edited = replace(&tree, &statement, "return 10 + 5;".into()).expect("Should replace");
    let err = replace(&edited, &stock, "public int Stock() { return 4; }".into()).unwrap_err();
    assert!(
        matches!(err, StructureError::StaleNodeReference { kind: SyntaxKind::MethodDeclaration, .. }),
        "{err}"
    );
}

#[test]
fn test_disjoint_selection_is_rejected() {
    let tree = parse(SHOP).expect("Should parse");
    let returns = find_all(
        &tree.root(),
        &NodePredicate::new().with_filter(NodeFilter::Exact(SyntaxKind::ReturnStatement)),
    );
    assert_eq!(returns.len(), 2);
    assert!(matches!(
        shallowest(&returns),
        Err(StructureError::DisjointNodeSet { .. })
    ));
}
