use cxxcompat_compare::{Classifier, CompareEngine, CompatReport, Matcher};
use cxxcompat_core::{ChangeKind, CompatConfig, PolicyConfig, Surface, Tier};
use cxxcompat_parser::{parse_cpp, DeclKind, DeclNode, ExtractOptions, SurfaceExtractor};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const HEADER: &str = r#"
#include <cstddef>
namespace  NS1
{
struct S {
    void f(int i, float);
    void g(double d) const;

    virtual int pure() = 0;
    virtual int v();

    template <typename T, std::size_t N = 50>
    void t(
            T element,
            unsigned u,
            double const& d,
            int & i);

    S() noexcept = default;
    void wi() noexcept(true);
    void wi2() noexcept(false);

    explicit S(double);
    S(int);
    ~S();
};

struct S0 {
    S0() = delete;
    virtual int v(double d);
    virtual int pure() = 0;
};

struct S2 : S0 {
    int v(double d) override;
private:
    int pure() final;
};
} // namespace NS1

void g(double d);
"#;

fn compare(old: &str, new: &str) -> CompatReport {
    compare_with(CompatConfig::default(), old, new)
}

fn compare_with(config: CompatConfig, old: &str, new: &str) -> CompatReport {
    let old = parse_cpp(old, "old.hpp").unwrap();
    let new = parse_cpp(new, "new.hpp").unwrap();
    CompareEngine::new(config)
        .compare_trees(&[old], &[new])
        .unwrap()
}

fn surface(source: &str) -> Surface {
    let tree = parse_cpp(source, "api.hpp").unwrap();
    SurfaceExtractor::new(ExtractOptions::default())
        .extract("api", &tree)
        .unwrap()
        .surface
}

fn kinds_for(report: &CompatReport, key: &str) -> Vec<(ChangeKind, Tier)> {
    report
        .changes
        .iter()
        .filter(|c| c.key == key)
        .map(|c| (c.kind, c.tier))
        .collect()
}

#[test]
fn test_identical_headers_yield_nothing() {
    let report = compare(HEADER, HEADER);
    assert!(report.is_empty(), "unexpected changes: {:?}", report.changes);
    assert_eq!(report.exit_code(Tier::Neutral), 0);
}

#[test]
fn test_virtual_removed_is_binary_break() {
    let new = HEADER.replace("virtual int v();", "int v();");
    let report = compare(HEADER, &new);
    assert_eq!(
        kinds_for(&report, "NS1::S::v()"),
        vec![(ChangeKind::VirtualityChanged, Tier::BinaryBreak)]
    );
    assert_eq!(report.exit_code(Tier::SourceBreak), 3);
}

#[test]
fn test_deleted_overload_added_is_source_break() {
    let new = HEADER.replace(
        "void f(int i, float);",
        "void f(int i, float);\n    void f(int) = delete;",
    );
    let report = compare(HEADER, &new);
    let changes = kinds_for(&report, "NS1::S::f(int)");
    assert!(changes.contains(&(ChangeKind::Added, Tier::Neutral)));
    assert!(changes.contains(&(ChangeKind::DeletedOverloadAdded, Tier::SourceBreak)));
    assert_eq!(report.max_tier(), Some(Tier::SourceBreak));
    assert!(kinds_for(&report, "NS1::S::f(int,float)").is_empty());
}

#[test]
fn test_template_default_removed_is_source_break() {
    let new = HEADER.replace(
        "template <typename T, std::size_t N = 50>",
        "template <typename T, std::size_t N>",
    );
    let report = compare(HEADER, &new);
    let t: Vec<_> = report
        .changes
        .iter()
        .filter(|c| c.qualified_name == "NS1::S::t")
        .map(|c| (c.kind, c.tier))
        .collect();
    assert_eq!(t, vec![(ChangeKind::TemplateDefaultRemoved, Tier::SourceBreak)]);
}

#[test]
fn test_unchanged_constructor_yields_nothing() {
    let new = HEADER.replace("void g(double d) const;", "void g(double d);");
    let report = compare(HEADER, &new);
    assert!(kinds_for(&report, "NS1::S::S(int)").is_empty());
    assert_eq!(
        kinds_for(&report, "NS1::S::g(double) const"),
        vec![(ChangeKind::ObjectQualifierChanged, Tier::BinaryBreak)]
    );
}

#[test]
fn test_pure_virtual_made_concrete() {
    let new = HEADER.replace(
        "    virtual int v(double d);\n    virtual int pure() = 0;",
        "    virtual int v(double d);\n    virtual int pure();",
    );
    assert_ne!(new, HEADER);
    let report = compare(HEADER, &new);
    assert_eq!(
        kinds_for(&report, "NS1::S0::pure()"),
        vec![(ChangeKind::NoLongerPureVirtual, Tier::SourceBreak)]
    );
    assert!(kinds_for(&report, "NS1::S2::pure()").is_empty());
    assert!(kinds_for(&report, "NS1::S::pure()").is_empty());
}

#[test]
fn test_volatile_is_never_silent() {
    let header = "struct V { void h(double d) volatile; };";
    let report = compare(header, header);
    assert_eq!(
        kinds_for(&report, "V::h(double) volatile"),
        vec![(ChangeKind::UnverifiableFacet, Tier::Unknown)]
    );
    assert_eq!(report.changes[0].unknown_facets.len(), 1);
    assert_eq!(report.exit_code(Tier::SourceBreak), 4);
}

#[test]
fn test_noexcept_severity_follows_policy() {
    let old = "void w(); void l() noexcept;";
    let new = "void w() noexcept; void l();";

    let report = compare(old, new);
    assert_eq!(
        kinds_for(&report, "w()"),
        vec![(ChangeKind::NoexceptTightened, Tier::BinaryBreak)]
    );
    assert_eq!(
        kinds_for(&report, "l()"),
        vec![(ChangeKind::NoexceptLoosened, Tier::SourceBreak)]
    );

    let mut config = CompatConfig::default();
    config.policy.noexcept_affects_abi = false;
    let report = compare_with(config, old, new);
    assert_eq!(
        kinds_for(&report, "w()"),
        vec![(ChangeKind::NoexceptTightened, Tier::Neutral)]
    );

    let mut config = CompatConfig::default();
    config
        .policy
        .overrides
        .insert("noexcept_loosened".into(), Tier::Neutral);
    config.policy.report_neutral = false;
    let report = compare_with(config, old, new);
    assert!(kinds_for(&report, "l()").is_empty());
    assert_eq!(report.max_tier(), Some(Tier::BinaryBreak));
}

#[test]
fn test_spelling_only_changes_yield_nothing() {
    let old = r#"
namespace api {
void s(signed int a, double const& b);
auto r() -> int;
unsigned long long n(long int /* count */);
}
"#;
    let new = r#"
namespace api {
void s(int x, const double &y);
int r();
unsigned long long int n(long count);
}
"#;
    let report = compare(old, new);
    assert!(report.is_empty(), "unexpected changes: {:?}", report.changes);
}

#[test]
fn test_matching_is_symmetric() {
    let old = surface(HEADER);
    let new = surface(&HEADER.replace("void f(int i, float);", "void f(int i);"));
    let policy = PolicyConfig::default();
    let classifier = Classifier::new(&policy);
    let matcher = Matcher::new(&classifier);

    let forward = matcher.match_surfaces(&old, &new);
    let backward = matcher.match_surfaces(&new, &old);

    let mut forward_pairs: Vec<_> = forward.matched().map(|(a, b, _)| (a, b)).collect();
    let mut backward_pairs: Vec<_> = backward.matched().map(|(b, a, _)| (a, b)).collect();
    forward_pairs.sort();
    backward_pairs.sort();
    assert_eq!(forward_pairs, backward_pairs);

    let removed: Vec<_> = forward.removed().collect();
    let added_back: Vec<_> = backward.added().collect();
    assert_eq!(removed, added_back);
    assert_eq!(removed.len(), 1);
}

#[test]
fn test_unrelated_additions_do_not_disturb_changes() {
    let new = HEADER.replace("virtual int v();", "int v();");
    let base = compare(HEADER, &new);

    let extra = "\nnamespace extra { int more(int); struct Plain { int x; }; }\n";
    let extended = compare(&format!("{}{}", HEADER, extra), &format!("{}{}", new, extra));
    assert_eq!(base.changes, extended.changes);
}

#[test]
fn test_removed_class_reports_class_and_symbols() {
    let old = "namespace api { struct Gone { void m(); int x; }; void keep(); }";
    let new = "namespace api { void keep(); }";
    let report = compare(old, new);
    assert_eq!(
        kinds_for(&report, "api::Gone::m()"),
        vec![(ChangeKind::SymbolRemoved, Tier::BinaryBreak)]
    );
    assert!(kinds_for(&report, "api::Gone::x").is_empty());
    assert_eq!(
        kinds_for(&report, "api::Gone"),
        vec![(ChangeKind::Removed, Tier::SourceBreak)]
    );
}

#[test]
fn test_layout_and_vtable_changes_of_surviving_class() {
    let old = "struct W { virtual void a(); int x; };";
    let new = "struct W { virtual void a(); virtual void b(); int x; int y; };";
    let report = compare(old, new);
    assert!(kinds_for(&report, "W::b()")
        .contains(&(ChangeKind::VtableLayoutChanged, Tier::BinaryBreak)));
    assert!(kinds_for(&report, "W::y").contains(&(ChangeKind::LayoutChanged, Tier::BinaryBreak)));
}

#[test]
fn test_enumerator_values_track_implicit_increments() {
    let old = "enum class Color : int { Red, Green, Blue };";
    let new = "enum class Color : int { Red, Yellow, Green, Blue };";
    let report = compare(old, new);
    let kinds: Vec<ChangeKind> = kinds_for(&report, "Color").into_iter().map(|(k, _)| k).collect();
    assert_eq!(
        kinds,
        vec![
            ChangeKind::EnumeratorValueChanged,
            ChangeKind::EnumeratorValueChanged,
            ChangeKind::EnumeratorAdded
        ]
    );
    assert_eq!(report.max_tier(), Some(Tier::BinaryBreak));
}

#[test]
fn test_ambiguous_pairings_are_unknown() {
    let old = "struct A { void k(); };";
    let new = "struct A { void k() const; void k() &&; };";
    let report = compare(old, new);
    assert!(report.changes.iter().any(|c| c.kind == ChangeKind::AmbiguousMatch));
    assert!(report
        .changes
        .iter()
        .filter(|c| c.key == "A::k()")
        .all(|c| c.ambiguous));
    assert_eq!(report.diagnostics.len(), 1);
    assert_eq!(report.max_tier(), Some(Tier::Unknown));
}

#[test]
fn test_conditional_noexcept_follows_tightening_policy() {
    let old = "struct N { int c() const noexcept(Toto); int d() noexcept; int e() noexcept(A); };";
    let new = "struct N { int c() const noexcept; int d() noexcept(Toto); int e() noexcept(B); };";

    let report = compare(old, new);
    assert_eq!(
        kinds_for(&report, "N::c() const"),
        vec![(ChangeKind::NoexceptTightened, Tier::BinaryBreak)]
    );
    assert_eq!(
        kinds_for(&report, "N::d()"),
        vec![(ChangeKind::NoexceptLoosened, Tier::SourceBreak)]
    );
    assert_eq!(
        kinds_for(&report, "N::e()"),
        vec![(ChangeKind::NoexceptConditionChanged, Tier::Unknown)]
    );

    let mut config = CompatConfig::default();
    config.policy.noexcept_affects_abi = false;
    let report = compare_with(config, old, new);
    assert_eq!(
        kinds_for(&report, "N::c() const"),
        vec![(ChangeKind::NoexceptTightened, Tier::Neutral)]
    );
}

#[test]
fn test_constructor_made_explicit_is_source_break() {
    let new = HEADER.replace("S(int);", "explicit S(int);");
    let report = compare(HEADER, &new);
    assert_eq!(
        kinds_for(&report, "NS1::S::S(int)"),
        vec![(ChangeKind::ExplicitAdded, Tier::SourceBreak)]
    );
}

#[test]
fn test_member_marked_deleted_is_source_break() {
    let new = HEADER.replace(
        "void wi() noexcept(true);",
        "void wi() noexcept(true) = delete;",
    );
    let report = compare(HEADER, &new);
    assert!(kinds_for(&report, "NS1::S::wi()")
        .contains(&(ChangeKind::BecameDeleted, Tier::SourceBreak)));
}

#[test]
fn test_access_narrowed_is_source_break() {
    let new = HEADER.replace(
        "struct S2 : S0 {\n    int v(double d) override;\nprivate:",
        "struct S2 : S0 {\nprivate:\n    int v(double d) override;",
    );
    assert_ne!(new, HEADER);
    let report = compare(HEADER, &new);
    assert!(kinds_for(&report, "NS1::S2::v(double)")
        .contains(&(ChangeKind::AccessNarrowed, Tier::SourceBreak)));
}

#[test]
fn test_array_bound_change_is_field_type_change() {
    let old = "template <typename T, int N> struct Buffer { T array[N]; };";
    let new = "template <typename T, int N> struct Buffer { T array[N+1]; };";
    let report = compare(old, new);
    assert!(kinds_for(&report, "Buffer::array")
        .contains(&(ChangeKind::FieldTypeChanged, Tier::BinaryBreak)));
}

#[test]
fn test_default_argument_removed_is_source_break() {
    let report = compare("void h(int a, int b = 2);", "void h(int a, int b);");
    assert_eq!(
        kinds_for(&report, "h(int,int)"),
        vec![(ChangeKind::DefaultArgumentRemoved, Tier::SourceBreak)]
    );
}

#[test]
fn test_new_default_colliding_with_overload_is_ambiguous() {
    let old = "void p(int a, int b); void p(int a);";
    let new = "void p(int a, int b = 0); void p(int a);";
    let report = compare(old, new);
    assert_eq!(
        kinds_for(&report, "p(int,int)"),
        vec![
            (ChangeKind::DefaultArgumentAdded, Tier::Neutral),
            (ChangeKind::DefaultArgumentAmbiguity, Tier::SourceBreak)
        ]
    );
    assert!(kinds_for(&report, "p(int)").is_empty());
}

#[test]
fn test_pure_virtual_added_to_surviving_class() {
    let old = "struct P { virtual ~P(); virtual void a() = 0; };";
    let new = "struct P { virtual ~P(); virtual void a() = 0; virtual void b() = 0; };";
    let report = compare(old, new);
    let b = kinds_for(&report, "P::b()");
    assert!(b.contains(&(ChangeKind::PureVirtualAdded, Tier::SourceBreak)));
    assert!(b.contains(&(ChangeKind::VtableLayoutChanged, Tier::BinaryBreak)));
}

#[test]
fn test_overriding_methods_add_no_vtable_slot() {
    let old = "struct B { virtual void f(); virtual void h(); virtual ~B(); };\nstruct D : B { int x; };";
    let new = "struct B { virtual void f(); virtual void h(); virtual ~B(); };\n\
               struct D : B { void f(); void h() final; virtual void k(); int x; };";
    let report = compare(old, new);
    assert_eq!(kinds_for(&report, "D::f()"), vec![(ChangeKind::Added, Tier::Neutral)]);
    assert_eq!(kinds_for(&report, "D::h()"), vec![(ChangeKind::Added, Tier::Neutral)]);
    assert!(kinds_for(&report, "D::k()")
        .contains(&(ChangeKind::VtableLayoutChanged, Tier::BinaryBreak)));
}

#[test]
fn test_unparsed_region_is_unknown() {
    let api = || DeclNode::namespace("api", vec![DeclNode::function("ok", Some("int"))]);
    let mut region = DeclNode::new(DeclKind::Unparsed);
    region.unparsed.push("@@@ garbage".to_string());
    let old = DeclNode::translation_unit(vec![api()]);
    let new = DeclNode::translation_unit(vec![api(), region]);

    let report = CompareEngine::new(CompatConfig::default())
        .compare_trees(&[old], &[new])
        .unwrap();
    let kinds: Vec<_> = report.changes.iter().map(|c| (c.kind, c.tier)).collect();
    assert_eq!(kinds, vec![(ChangeKind::UnparsedRegion, Tier::Unknown)]);
    assert!(report.changes[0].unknown_facets[0].contains("@@@ garbage"));
    assert_eq!(report.exit_code(Tier::SourceBreak), 4);
}

#[test]
fn test_hidden_changes_still_fail() {
    let new = HEADER.replace("virtual int v();", "int v();");
    let report = compare(HEADER, &new);
    let shown = report.clone().hide_below(Tier::Unknown);
    assert!(shown.is_empty());
    assert_eq!(shown.exit_code(Tier::SourceBreak), 3);
}

#[tokio::test]
async fn test_compare_files_from_disk() {
    let dir = TempDir::new().unwrap();
    let old_dir = dir.path().join("v1");
    let new_dir = dir.path().join("v2");
    fs::create_dir_all(&old_dir).unwrap();
    fs::create_dir_all(&new_dir).unwrap();
    fs::write(old_dir.join("api.hpp"), "namespace api { int answer(); }").unwrap();
    fs::write(new_dir.join("api.hpp"), "namespace api { long answer(); }").unwrap();

    let engine = Arc::new(CompareEngine::new(CompatConfig::default()));
    let report = engine
        .compare_files(vec![old_dir], vec![new_dir])
        .await
        .unwrap();
    assert_eq!(
        kinds_for(&report, "api::answer()"),
        vec![(ChangeKind::ReturnTypeChanged, Tier::BinaryBreak)]
    );
}
