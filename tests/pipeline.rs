//! End-to-end conversion over a miniature checkout: discovery, call
//! graph, closure, planning, and emission run against real files, with
//! the translation unit hand-built the way the frontend would lower it.

use std::fs;
use std::path::{Path, PathBuf};

use assert_fs::TempDir;
use assert_fs::prelude::*;

use imgui_explicit::cli::AppContext;
use imgui_explicit::core::callgraph::collect_calls;
use imgui_explicit::core::compat;
use imgui_explicit::core::database::FunctionDatabase;
use imgui_explicit::core::discovery::discover;
use imgui_explicit::core::emitter::{EmitOptions, emit};
use imgui_explicit::core::ledger::SourceLedger;
use imgui_explicit::core::model::CodeRange;
use imgui_explicit::core::planner::plan_edits;
use imgui_explicit::infra::config::{Config, RepoLayout};
use imgui_explicit::parsers::tu::{CursorKind, Node, NodeId, TranslationUnit, TuBuilder};

const PUBLIC_HEADER: &str = "\
namespace ImGui
{
    IMGUI_API void          NewFrame();
    IMGUI_API void          Text(const char* fmt, ...) IM_FMTARGS(1);
    IMGUI_API const char*   GetVersion();
}
";

const INTERNAL_HEADER: &str = "\
namespace ImGui
{
    IMGUI_API void ErrorCheckNewFrameSanityChecks();
}
";

const MAIN_UNIT: &str = "\
void ImGui::ErrorCheckNewFrameSanityChecks()
{
    ImGuiContext& g = *GImGui;
}
void ImGui::NewFrame()
{
    ErrorCheckNewFrameSanityChecks();
}
void ImGui::Text(const char* fmt, ...)
{
    ImGuiContext& g = *GImGui;
}
const char* ImGui::GetVersion()
{
    return \"1.90\";
}
";

const DEMO_UNIT: &str = "\
namespace ImGui
{
    IMGUI_API void ErrorCheckNewFrameSanityChecks();
}
";

/// 1-based (line, column) of a needle within fixture text.
fn locate(content: &str, line_no: u32, needle: &str) -> (u32, u32) {
    let line = content.lines().nth(line_no as usize - 1).unwrap();
    let col = line.find(needle).unwrap() as u32 + 1;
    (line_no, col)
}

fn token_range(path: &Path, content: &str, line_no: u32, needle: &str) -> CodeRange {
    let (line, col) = locate(content, line_no, needle);
    CodeRange::from_token(path, line, col, needle.len())
}

struct Fixture {
    /// Keeps the temp checkout alive for the duration of the test.
    _dir: TempDir,
    layout: RepoLayout,
    tu: TranslationUnit,
}

fn declaration(
    b: &mut TuBuilder,
    parent: NodeId,
    path: &Path,
    content: &str,
    line_no: u32,
    name: &str,
    mangled: &str,
    ret: &str,
) -> NodeId {
    let (line, col) = locate(content, line_no, name);
    let node = Node::new(CursorKind::FunctionDecl, name)
        .with_location(path.to_path_buf(), line, col)
        .with_mangled(mangled)
        .with_fq_name(format!("ImGui::{name}"))
        .with_scope("ImGui")
        .with_result_type(ret);
    let id = b.add(parent, node);
    b.add(id, Node::new(CursorKind::AnnotateAttr, "imgui_api"));
    id
}

fn definition(
    b: &mut TuBuilder,
    path: &Path,
    content: &str,
    line_no: u32,
    name: &str,
    mangled: &str,
    ret: &str,
) -> NodeId {
    let (line, col) = locate(content, line_no, name);
    b.add(
        b.root(),
        Node::new(CursorKind::FunctionDecl, name)
            .with_location(path.to_path_buf(), line, col)
            .with_mangled(mangled)
            .with_fq_name(format!("ImGui::{name}"))
            .with_scope("ImGui")
            .with_result_type(ret)
            .defining(),
    )
}

fn gimgui_ref(b: &mut TuBuilder, parent: NodeId, path: &Path, content: &str, line_no: u32) {
    let (line, col) = locate(content, line_no, "GImGui");
    // Zero-width extent, exercising the locator recovery.
    b.add(
        parent,
        Node::new(CursorKind::DeclRefExpr, "GImGui")
            .with_location(path.to_path_buf(), line, col)
            .with_extent(CodeRange::new(path, line, col, line, col)),
    );
}

fn build_fixture() -> Fixture {
    let dir = TempDir::new().unwrap();
    dir.child("imgui.h").write_str(PUBLIC_HEADER).unwrap();
    dir.child("imgui_internal.h").write_str(INTERNAL_HEADER).unwrap();
    dir.child("imgui.cpp").write_str(MAIN_UNIT).unwrap();
    dir.child("imgui_demo.cpp").write_str(DEMO_UNIT).unwrap();
    for placeholder in ["imgui_draw.cpp", "imgui_tables.cpp", "imgui_widgets.cpp"] {
        dir.child(placeholder).write_str("// placeholder\n").unwrap();
    }
    dir.child("imstb_textedit.h").write_str("// helpers\n").unwrap();

    let layout = RepoLayout::new(dir.path());
    let header = layout.public_header.clone();
    let internal = layout.internal_header.clone();
    let main = layout.main_unit.clone();
    let demo = layout.demo_unit.clone();

    let mut b = TuBuilder::new();
    let ns = b.add(b.root(), Node::new(CursorKind::Namespace, "ImGui"));

    // Public declarations
    declaration(
        &mut b, ns, &header, PUBLIC_HEADER, 3, "NewFrame", "_ZN5ImGui8NewFrameEv", "void",
    );
    let text_decl = declaration(
        &mut b, ns, &header, PUBLIC_HEADER, 4, "Text", "_ZN5ImGui4TextEPKcz", "void",
    );
    let (fmt_line, fmt_col) = locate(PUBLIC_HEADER, 4, "IM_FMTARGS(");
    b.add(
        text_decl,
        Node::new(CursorKind::AnnotateAttr, "IM_FMTARGS(1)")
            .with_location(header.clone(), fmt_line, fmt_col),
    );
    let fmt_param = b.add(
        text_decl,
        Node::new(CursorKind::ParmDecl, "fmt")
            .with_type("const char *")
            .with_extent(token_range(&header, PUBLIC_HEADER, 4, "const char* fmt")),
    );
    b.add_argument(text_decl, fmt_param);
    declaration(
        &mut b, ns, &header, PUBLIC_HEADER, 5, "GetVersion", "_ZN5ImGui10GetVersionEv",
        "const char *",
    );

    // Internal declaration plus its demo-side duplicate
    let internal_ns = b.add(b.root(), Node::new(CursorKind::Namespace, "ImGui"));
    declaration(
        &mut b,
        internal_ns,
        &internal,
        INTERNAL_HEADER,
        3,
        "ErrorCheckNewFrameSanityChecks",
        "_ZN5ImGui30ErrorCheckNewFrameSanityChecksEv",
        "void",
    );
    let demo_ns = b.add(b.root(), Node::new(CursorKind::Namespace, "ImGui"));
    declaration(
        &mut b,
        demo_ns,
        &demo,
        DEMO_UNIT,
        3,
        "ErrorCheckNewFrameSanityChecks",
        "_ZN5ImGui30ErrorCheckNewFrameSanityChecksEv",
        "void",
    );

    // Definitions
    let sanity_def = definition(
        &mut b,
        &main,
        MAIN_UNIT,
        1,
        "ErrorCheckNewFrameSanityChecks",
        "_ZN5ImGui30ErrorCheckNewFrameSanityChecksEv",
        "void",
    );
    gimgui_ref(&mut b, sanity_def, &main, MAIN_UNIT, 3);

    let new_frame_def = definition(
        &mut b, &main, MAIN_UNIT, 5, "NewFrame", "_ZN5ImGui8NewFrameEv", "void",
    );
    let (call_line, call_col) = locate(MAIN_UNIT, 7, "ErrorCheckNewFrameSanityChecks");
    let call = b.add(
        new_frame_def,
        Node::new(CursorKind::CallExpr, "ErrorCheckNewFrameSanityChecks")
            .with_location(main.clone(), call_line, call_col),
    );
    b.set_definition(call, sanity_def);

    let text_def = definition(
        &mut b, &main, MAIN_UNIT, 9, "Text", "_ZN5ImGui4TextEPKcz", "void",
    );
    let text_param = b.add(
        text_def,
        Node::new(CursorKind::ParmDecl, "fmt")
            .with_type("const char *")
            .with_extent(token_range(&main, MAIN_UNIT, 9, "const char* fmt")),
    );
    b.add_argument(text_def, text_param);
    gimgui_ref(&mut b, text_def, &main, MAIN_UNIT, 11);

    definition(
        &mut b, &main, MAIN_UNIT, 13, "GetVersion", "_ZN5ImGui10GetVersionEv", "const char *",
    );

    Fixture {
        _dir: dir,
        layout,
        tu: b.finish(),
    }
}

fn convert(fixture: &Fixture) -> (FunctionDatabase, SourceLedger) {
    let config = Config::default();
    let mut ledger = SourceLedger::load(&fixture.layout.source_set()).unwrap();
    let entries = discover(&fixture.tu, &ledger, &config, &fixture.layout).unwrap();
    let mut db = FunctionDatabase::build(entries, &fixture.layout.demo_unit).unwrap();
    collect_calls(&fixture.tu, &ledger, &config, &fixture.layout, &mut db).unwrap();
    db.compute_context_need(&config.classes_with_context);
    plan_edits(&db, &config, &mut ledger).unwrap();
    (db, ledger)
}

#[test]
fn converts_the_miniature_checkout_end_to_end() {
    let fixture = build_fixture();
    let (db, ledger) = convert(&fixture);

    let apis = db.public_apis(&fixture.layout.public_header);
    let names: Vec<&str> = apis.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, ["NewFrame", "Text", "GetVersion"]);

    let header_block = compat::render_header_block(&apis);
    let implicit_unit = compat::render_implicit_unit(&apis);

    let ctx = AppContext {
        quiet: true,
        no_color: true,
    };
    let report = emit(
        &ledger,
        &fixture.layout,
        &EmitOptions {
            apply: true,
            include_demo: false,
        },
        &header_block,
        &implicit_unit,
        &ctx,
    )
    .unwrap();
    assert!(report.applied);

    // The rewritten public header: explicit namespace, threaded
    // signatures, shifted format index, and the appended implicit block.
    let header = fs::read_to_string(&fixture.layout.public_header).unwrap();
    assert!(header.starts_with("namespace ImGuiEx\n"));
    assert!(header.contains("IMGUI_API void          NewFrame(ImGuiContext* ctx);"));
    assert!(header.contains(
        "IMGUI_API void          Text(ImGuiContext* ctx, const char* fmt, ...) IM_FMTARGS(2);"
    ));
    assert!(header.contains("IMGUI_API const char*   GetVersion();"));
    assert!(header.contains("#ifndef IMGUI_DISABLE_IMPLICIT_API"));
    // The wrapper declarations keep the original shapes.
    assert!(header.contains("IMGUI_API void Text(const char* fmt, ...) IM_FMTARGS(1);"));

    // The implementation unit: bodies use ctx, the call forwards it.
    let main = fs::read_to_string(&fixture.layout.main_unit).unwrap();
    assert!(main.contains("void ImGuiEx::ErrorCheckNewFrameSanityChecks(ImGuiContext* ctx)"));
    assert!(main.contains("    ImGuiContext& g = *ctx;\n"));
    assert!(main.contains("void ImGuiEx::NewFrame(ImGuiContext* ctx)"));
    assert!(main.contains("    ErrorCheckNewFrameSanityChecks(ctx);\n"));
    assert!(main.contains("void ImGuiEx::Text(ImGuiContext* ctx, const char* fmt, ...)"));
    assert!(!main.contains("GImGui"));
    // Context-free functions keep their signatures.
    assert!(main.contains("const char* ImGuiEx::GetVersion()"));

    // The internal declaration was threaded too.
    let internal = fs::read_to_string(&fixture.layout.internal_header).unwrap();
    assert!(internal.contains(
        "IMGUI_API void ErrorCheckNewFrameSanityChecks(ImGuiContext* ctx);"
    ));

    // The generated unit defines the global and va-forwards Text.
    let implicit = fs::read_to_string(fixture.layout.implicit_unit()).unwrap();
    assert!(implicit.contains("ImGuiContext*   GImGui = NULL;"));
    assert!(implicit.contains("ImGuiEx::NewFrame(GImGui);"));
    assert!(implicit.contains("ImGuiEx::TextV(GImGui, fmt, args);"));
    assert!(implicit.contains("return ImGuiEx::GetVersion();"));

    // The demo unit is parsed but never written without --include-demo.
    assert_eq!(
        fs::read_to_string(&fixture.layout.demo_unit).unwrap(),
        DEMO_UNIT
    );
}

#[test]
fn duplicate_declarations_resolve_to_the_non_demo_site() {
    let fixture = build_fixture();
    let (db, _ledger) = convert(&fixture);

    let decl = db
        .declaration(&imgui_explicit::core::model::FunctionId::new(
            "_ZN5ImGui30ErrorCheckNewFrameSanityChecksEv",
        ))
        .unwrap();
    assert_eq!(
        PathBuf::from(&decl.code_range.file),
        fixture.layout.internal_header
    );
}

#[test]
fn closure_covers_exactly_the_context_dependent_functions() {
    let fixture = build_fixture();
    let (db, _ledger) = convert(&fixture);

    let need: Vec<(&str, bool)> = db
        .definitions()
        .map(|d| (d.name.as_str(), d.need_context_param))
        .collect();
    assert!(need.contains(&("ErrorCheckNewFrameSanityChecks", true)));
    assert!(need.contains(&("NewFrame", true)));
    assert!(need.contains(&("Text", true)));
    assert!(need.contains(&("GetVersion", false)));
}
