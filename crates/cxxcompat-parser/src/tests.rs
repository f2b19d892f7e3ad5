use crate::{
    collect_declaration_files, parse_cpp, DeclKind, DeclNode, DeclarationSource, ExtractOptions,
    Extraction, JsonDeclSource, LanguageRegistry, SourceLoader, SurfaceExtractor,
    TemplateParamDecl,
};
use cxxcompat_core::{
    Access, CompatError, DefinitionState, Diagnostic, Dispatch, EntityKind, ExceptionCategory,
    Facet, NoexceptSpec, RefQualifier, Surface,
};
use std::fs;
use tempfile::TempDir;

const FIXTURE: &str = r#"
#include <cstddef>
namespace  NS1
{
struct S {
    void f(int i, float);
    void g(double d) const;
    void h(double d) volatile;
    constexpr auto i(double d = 12.5) { return 42 * d;}

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
    void wi3() noexcept;

    void f(int) = delete;

    explicit S(double);
    S(int);
    ~S();
    S(S const&);
    S& operator=(S const&);
    S& operator=(S &&) = delete;
};

constexpr bool Toto = false;
struct S0 {
    S0() = delete;
    virtual int v(double d);
    virtual int v_pub_pri();
    virtual int pure() = 0;
private:
    virtual int constone(S const& s) const noexcept(Toto);
    virtual int constone2(S const& s) const noexcept(Toto) = 0;
};

struct S2 : S0 {
    int v(double d) override {
        return 42;
    }
private:
    int v_pub_pri() override;
    int pure() final;
public:
    class C {
        C() = default;
        static void f();

        bool doWeCanAnInfiniteLoop(C const& brother);
    };
};

template <typename T, std::size_t N = 50>
struct S3 : S2, private S2::C
{
    void reset() ;
    T array[N] = {};
};
} // namespace NS1

void g(double d);
"#;

fn extract(source: &str) -> Extraction {
    let tree = parse_cpp(source, "fixture.hpp").unwrap();
    SurfaceExtractor::new(ExtractOptions::default())
        .extract("fixture", &tree)
        .unwrap()
}

fn fixture() -> Surface {
    extract(FIXTURE).surface
}

#[test]
fn test_fixture_records_and_namespaces() {
    let surface = fixture();
    assert_eq!(surface.find("NS1").unwrap().kind, EntityKind::Namespace);
    for record in ["NS1::S", "NS1::S0", "NS1::S2", "NS1::S3"] {
        assert_eq!(surface.find(record).unwrap().kind, EntityKind::Struct, "{}", record);
    }
    assert_eq!(surface.find("NS1::S2::C").unwrap().kind, EntityKind::Class);
    assert!(surface.find("NS1::S3").unwrap().template.is_some());
}

#[test]
fn test_overloads_get_distinct_keys() {
    let surface = fixture();
    let f_int_float = surface.find("NS1::S::f(int,float)").unwrap();
    let f_int = surface.find("NS1::S::f(int)").unwrap();
    assert_ne!(f_int_float.id, f_int.id);
    assert_eq!(
        f_int.signature().unwrap().definition,
        DefinitionState::Deleted
    );
    assert_eq!(surface.lookup("NS1::S::f").count(), 2);
}

#[test]
fn test_method_qualifiers() {
    let surface = fixture();
    let g = surface.find("NS1::S::g(double) const").unwrap();
    assert!(g.signature().unwrap().qualifiers.is_const);
    assert!(g.external_linkage);

    let h = surface.find("NS1::S::h(double) volatile").unwrap();
    assert!(h.signature().unwrap().qualifiers.is_volatile.is_unknown());
    assert!(h.has_unknown_facets());

    let move_assign = surface.find("NS1::S::operator=(S&&)").unwrap();
    assert_eq!(
        move_assign.signature().unwrap().definition,
        DefinitionState::Deleted
    );
    assert!(surface.find("NS1::S::operator=(const S&)").is_some());
    assert!(surface.find("NS1::S::S(const S&)").is_some());
    assert_eq!(
        move_assign.signature().unwrap().qualifiers.ref_qualifier,
        RefQualifier::None
    );
}

#[test]
fn test_volatile_is_reported_as_diagnostic() {
    let extraction = extract(FIXTURE);
    assert!(extraction.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UnrepresentableFacet { facet, .. } if facet == "volatile"
    )));
}

#[test]
fn test_default_arguments_and_constexpr() {
    let surface = fixture();
    let i = surface.find("NS1::S::i(double)").unwrap();
    let sig = i.signature().unwrap();
    assert_eq!(sig.params[0].default.as_deref(), Some("12.5"));
    assert!(sig.is_constexpr);
    assert!(!i.external_linkage);
}

#[test]
fn test_member_template_shape_and_defaults() {
    let surface = fixture();
    let t = surface.lookup("NS1::S::t").next().unwrap();
    let template = t.template.as_ref().unwrap();
    assert_eq!(template.params.len(), 2);
    assert_eq!(template.params[1].default.as_deref(), Some("50"));
    assert_eq!(
        t.signature().unwrap().param_list(),
        "(T,unsigned int,const double&,int&)"
    );
    assert!(t.key.starts_with("NS1::S::t<typename,auto>("));
}

#[test]
fn test_virtuality_and_purity() {
    let surface = fixture();
    let pure = surface.find("NS1::S::pure()").unwrap();
    assert_eq!(
        pure.signature().unwrap().virtuality.dispatch,
        Dispatch::PureVirtual
    );
    assert!(!pure.external_linkage);
    assert_eq!(
        surface.find("NS1::S::v()").unwrap().signature().unwrap().virtuality.dispatch,
        Dispatch::Virtual
    );

    let overriding = surface.find("NS1::S2::pure()").unwrap();
    let virtuality = overriding.signature().unwrap().virtuality;
    assert!(virtuality.is_final);
    assert_eq!(virtuality.dispatch, Dispatch::Virtual);
    assert_eq!(overriding.access, Access::Private);
}

#[test]
fn test_noexcept_forms() {
    let surface = fixture();
    let noexcept = |key: &str| surface.find(key).unwrap().signature().unwrap().noexcept.clone();
    assert_eq!(noexcept("NS1::S::wi()"), Facet::Known(NoexceptSpec::True));
    assert_eq!(noexcept("NS1::S::wi2()"), Facet::Known(NoexceptSpec::False));
    assert_eq!(noexcept("NS1::S::wi3()"), Facet::Known(NoexceptSpec::True));
    assert_eq!(noexcept("NS1::S::~S()"), Facet::Known(NoexceptSpec::True));
    assert_eq!(
        noexcept("NS1::S0::constone(const S&) const"),
        Facet::Known(NoexceptSpec::Conditional("Toto".into()))
    );
    assert_eq!(
        noexcept("NS1::S0::constone(const S&) const")
            .known()
            .map(|n| n.category()),
        Some(ExceptionCategory::Dependent)
    );
}

#[test]
fn test_special_members() {
    let surface = fixture();
    let ctor = surface.find("NS1::S::S()").unwrap();
    assert_eq!(ctor.kind, EntityKind::Constructor);
    assert_eq!(
        ctor.signature().unwrap().definition,
        DefinitionState::Defaulted
    );
    assert!(ctor.signature().unwrap().return_type.is_none());

    let explicit = surface.find("NS1::S::S(double)").unwrap();
    assert_eq!(explicit.signature().unwrap().is_explicit, Facet::Known(true));
    assert_eq!(
        surface.find("NS1::S::S(int)").unwrap().signature().unwrap().is_explicit,
        Facet::Known(false)
    );
    assert_eq!(
        surface.find("NS1::S::~S()").unwrap().kind,
        EntityKind::Destructor
    );
    assert_eq!(
        surface.find("NS1::S0::S0()").unwrap().signature().unwrap().definition,
        DefinitionState::Deleted
    );
}

#[test]
fn test_access_tracking() {
    let surface = fixture();
    assert_eq!(
        surface.find("NS1::S0::v(double)").unwrap().access,
        Access::Public
    );
    assert_eq!(
        surface.find("NS1::S0::constone(const S&) const").unwrap().access,
        Access::Private
    );
    // class members default to private
    assert_eq!(
        surface.find("NS1::S2::C::C()").unwrap().access,
        Access::Private
    );
    assert!(surface.find("NS1::S2::C::f()").unwrap().signature().unwrap().is_static);
}

#[test]
fn test_bases_are_resolved() {
    let surface = fixture();
    let s2 = surface.find("NS1::S2").unwrap().record().unwrap();
    assert_eq!(s2.bases.len(), 1);
    assert_eq!(s2.bases[0].name, "NS1::S0");
    assert_eq!(s2.bases[0].access, Access::Public);

    let s3 = surface.find("NS1::S3").unwrap().record().unwrap();
    let names: Vec<_> = s3.bases.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["NS1::S2", "NS1::S2::C"]);
    assert_eq!(s3.bases[1].access, Access::Private);
}

#[test]
fn test_fields_and_variables() {
    let surface = fixture();
    let array = surface.find("NS1::S3::array").unwrap();
    let field = array.field().unwrap();
    assert_eq!(field.layout_index, Some(0));
    assert_eq!(field.ty.as_str(), "T[N]");

    let toto = surface.find("NS1::Toto").unwrap();
    assert_eq!(toto.kind, EntityKind::Variable);
    assert!(!toto.external_linkage);

    let g = surface.find("g(double)").unwrap();
    assert_eq!(g.kind, EntityKind::Function);
    assert!(g.external_linkage);
}

#[test]
fn test_implicit_virtuality_from_base() {
    let surface = extract(
        r#"
struct B { virtual void m(int); virtual ~B(); };
struct D : B { void m(int); void n(); ~D(); };
"#,
    )
    .surface;
    let dispatch = |key: &str| {
        surface
            .find(key)
            .unwrap()
            .signature()
            .unwrap()
            .virtuality
            .dispatch
    };
    assert_eq!(dispatch("D::m(int)"), Dispatch::Virtual);
    assert_eq!(dispatch("D::~D()"), Dispatch::Virtual);
    assert_eq!(dispatch("D::n()"), Dispatch::NonVirtual);
}

#[test]
fn test_anonymous_namespace_is_excluded() {
    let surface = extract(
        r#"
namespace { int hidden(); }
namespace api { namespace { struct Impl {}; } void visible(); }
"#,
    )
    .surface;
    assert!(surface.find("hidden()").is_none());
    assert!(surface.iter().all(|e| !e.qualified_name.contains("Impl")));
    assert!(surface.find("api::visible()").is_some());
}

#[test]
fn test_anonymous_union_members_are_flattened() {
    let surface = extract("struct V { int tag; union { int i; float f; }; };").surface;
    assert!(surface.find("V::i").is_some());
    assert!(surface.find("V::f").is_some());
    let fields = surface.fields_in_layout_order(surface.find("V").unwrap().id);
    assert_eq!(fields.len(), 3);
}

#[test]
fn test_include_guard_contents_are_extracted() {
    let surface = extract(
        r#"
#ifndef API_H
#define API_H
namespace api { int answer(); }
#endif
"#,
    )
    .surface;
    assert!(surface.find("api::answer()").is_some());
}

#[test]
fn test_parse_errors_become_unknown() {
    let extraction = extract("namespace api { void ok(); } @@@ garbage ;");
    assert!(extraction.surface.find("api::ok()").is_some());
    let damaged = !extraction.surface.unparsed_regions().is_empty()
        || extraction.surface.iter().any(|e| e.has_unknown_facets());
    assert!(damaged);
}

#[test]
fn test_roots_limit_extraction() {
    let tree = parse_cpp(FIXTURE, "fixture.hpp").unwrap();
    let options = ExtractOptions {
        roots: vec!["NS1".into()],
        exclude_namespaces: vec![],
    };
    let surface = SurfaceExtractor::new(options)
        .extract("fixture", &tree)
        .unwrap()
        .surface;
    assert!(surface.find("g(double)").is_none());
    assert!(surface.find("NS1::S").is_some());
}

#[test]
fn test_excluded_namespaces_are_skipped() {
    let tree = parse_cpp(
        "namespace api { namespace detail { void impl(); } void run(); }",
        "api.hpp",
    )
    .unwrap();
    let options = ExtractOptions {
        roots: vec![],
        exclude_namespaces: vec!["detail".into()],
    };
    let surface = SurfaceExtractor::new(options)
        .extract("api", &tree)
        .unwrap()
        .surface;
    assert!(surface.find("api::detail::impl()").is_none());
    assert!(surface.find("api::run()").is_some());
}

#[test]
fn test_internal_linkage_is_excluded() {
    let surface = extract(
        r#"
namespace api {
static int helper(int);
static int counter;
int exported(int);
struct K { static int shared; static void make(); };
}
"#,
    )
    .surface;
    assert!(surface.find("api::helper(int)").is_none());
    assert!(surface.find("api::counter").is_none());
    assert!(surface.find("api::exported(int)").unwrap().external_linkage);
    assert!(surface.find("api::K::shared").unwrap().external_linkage);
    assert!(surface.find("api::K::make()").is_some());
}

#[test]
fn test_conflicting_kinds_are_malformed() {
    let tree = DeclNode::translation_unit(vec![
        DeclNode::record(DeclKind::Struct, "X", vec![]),
        DeclNode::namespace("X", vec![]),
    ]);
    let err = SurfaceExtractor::new(ExtractOptions::default())
        .extract("bad", &tree)
        .unwrap_err();
    assert!(matches!(err, CompatError::MalformedSurface { .. }));
}

#[test]
fn test_non_unit_root_is_malformed() {
    let err = SurfaceExtractor::new(ExtractOptions::default())
        .extract("bad", &DeclNode::namespace("NS", vec![]))
        .unwrap_err();
    assert!(matches!(err, CompatError::MalformedSurface { .. }));
}

#[test]
fn test_hand_built_tree_extracts_like_source() {
    let tree = DeclNode::translation_unit(vec![DeclNode::namespace(
        "NS1",
        vec![DeclNode::record(
            DeclKind::Struct,
            "S",
            vec![
                DeclNode::function("f", Some("void"))
                    .with_param("int", None)
                    .with_param("float", None),
                DeclNode::function("t", Some("void"))
                    .with_param("T", None)
                    .with_template(vec![
                        TemplateParamDecl::type_param("T"),
                        TemplateParamDecl::non_type("N", "std::size_t").with_default("50"),
                    ]),
                DeclNode::function("pure", Some("int"))
                    .with_specifier("virtual")
                    .with_trailing("= 0"),
            ],
        )],
    )]);
    let surface = SurfaceExtractor::new(ExtractOptions::default())
        .extract("built", &tree)
        .unwrap()
        .surface;
    assert!(surface.find("NS1::S::f(int,float)").is_some());
    assert!(surface.find("NS1::S::t<typename,auto>(T)").is_some());
    assert_eq!(
        surface
            .find("NS1::S::pure()")
            .unwrap()
            .signature()
            .unwrap()
            .virtuality
            .dispatch,
        Dispatch::PureVirtual
    );
}

#[test]
fn test_unknown_attributes_are_unknown_facets() {
    let tree = DeclNode::translation_unit(vec![
        DeclNode::function("a", Some("int")).with_attribute("[[nodiscard]]"),
        DeclNode::function("b", Some("int")).with_attribute("__attribute__((visibility(\"hidden\")))"),
    ]);
    let surface = SurfaceExtractor::new(ExtractOptions::default())
        .extract("attrs", &tree)
        .unwrap()
        .surface;
    let a = surface.find("a()").unwrap();
    assert!(a.attributes.contains("nodiscard"));
    assert!(!a.has_unknown_facets());
    assert!(surface.find("b()").unwrap().has_unknown_facets());
}

#[tokio::test]
async fn test_loader_reads_headers_and_json() {
    let temp_dir = TempDir::new().unwrap();
    let header = temp_dir.path().join("api.hpp");
    fs::write(&header, "namespace api { int answer(); }").unwrap();

    let json_tree = DeclNode::translation_unit(vec![DeclNode::namespace(
        "api",
        vec![DeclNode::function("extra", Some("void"))],
    )]);
    let json = temp_dir.path().join("extra.json");
    fs::write(&json, serde_json::to_string(&json_tree).unwrap()).unwrap();
    fs::write(temp_dir.path().join("notes.txt"), "ignored").unwrap();

    let loader = SourceLoader::new();
    let trees = loader.load_all(&[temp_dir.path().to_path_buf()]).await.unwrap();
    assert_eq!(trees.len(), 2);

    let surface = SurfaceExtractor::new(ExtractOptions::default())
        .extract_all("dir", &trees)
        .unwrap()
        .surface;
    assert!(surface.find("api::answer()").is_some());
    assert!(surface.find("api::extra()").is_some());
}

#[tokio::test]
async fn test_json_source_rejects_non_unit_root() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("bad.json");
    fs::write(&path, r#"{"kind":"namespace","name":"x"}"#).unwrap();
    let err = JsonDeclSource.parse_file(&path).await.unwrap_err();
    assert!(matches!(err, CompatError::UnsupportedInput(_)));
}

#[tokio::test]
async fn test_loader_rejects_unknown_file_type() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("api.txt");
    fs::write(&path, "int x;").unwrap();
    let err = SourceLoader::new().load(&path).await.unwrap_err();
    assert!(matches!(err, CompatError::UnsupportedInput(_)));
}

#[test]
fn test_truncated_noexcept_is_unknown() {
    let tree = DeclNode::translation_unit(vec![DeclNode::namespace(
        "api",
        vec![DeclNode::function("f", Some("void")).with_trailing("noexcept(")],
    )]);
    let extraction = SurfaceExtractor::new(ExtractOptions::default())
        .extract("json", &tree)
        .unwrap();
    let f = extraction.surface.find("api::f()").unwrap();
    assert!(matches!(f.signature().unwrap().noexcept, Facet::Unknown(_)));
    assert!(extraction.diagnostics.iter().any(|d| matches!(
        d,
        Diagnostic::UnrepresentableFacet { facet, .. } if facet == "exception specification"
    )));
}

#[test]
fn test_damaged_noexcept_in_header_does_not_abort() {
    let extraction = extract("struct S { void f() noexcept( ; };\nnamespace api { int ok(); }");
    if let Some(f) = extraction.surface.find("S::f()") {
        assert!(!matches!(
            f.signature().unwrap().noexcept,
            Facet::Known(NoexceptSpec::Conditional(ref inner)) if inner.is_empty()
        ));
    }
    let damaged = !extraction.surface.unparsed_regions().is_empty()
        || extraction.surface.iter().any(|e| e.has_unknown_facets());
    assert!(damaged);
}

#[tokio::test]
async fn test_loader_walks_nested_directories_in_order() {
    let temp_dir = TempDir::new().unwrap();
    let nested = temp_dir.path().join("detail");
    let generated = temp_dir.path().join("generated");
    fs::create_dir_all(&nested).unwrap();
    fs::create_dir_all(&generated).unwrap();
    fs::write(temp_dir.path().join("b.hpp"), "namespace api { int b(); }").unwrap();
    fs::write(nested.join("a.hpp"), "namespace api { int a(); }").unwrap();
    fs::write(generated.join("g.hpp"), "namespace api { int g(); }").unwrap();
    fs::write(temp_dir.path().join(".ignore"), "generated/\n").unwrap();

    let files = collect_declaration_files(temp_dir.path(), &LanguageRegistry::new()).unwrap();
    assert_eq!(
        files,
        vec![temp_dir.path().join("b.hpp"), nested.join("a.hpp")]
    );

    let trees = SourceLoader::new()
        .load_all(&[temp_dir.path().to_path_buf()])
        .await
        .unwrap();
    let surface = SurfaceExtractor::new(ExtractOptions::default())
        .extract_all("dir", &trees)
        .unwrap()
        .surface;
    assert!(surface.find("api::a()").is_some());
    assert!(surface.find("api::g()").is_none());
}
