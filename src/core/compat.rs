//! Generator for the implicit-context compatibility layer.
//!
//! Two artifacts: a guarded declaration block appended to the public
//! header (original signatures, defaults included), and a definitions
//! unit holding the `GImGui` global, the four context lifecycle shims,
//! and one forwarding wrapper per public API. Formatted-args wrappers
//! open a `va_list` and forward to the `V`-suffixed explicit callee.

use itertools::Itertools;
use std::fmt::Write;

use crate::core::model::FunctionEntry;

/// Guard macro around the implicit declarations.
pub const IMPLICIT_API_GUARD: &str = "IMGUI_DISABLE_IMPLICIT_API";

/// Lifecycle declarations the wrappers rely on; their explicit-namespace
/// counterparts are exempt from the rewrite.
const LIFECYCLE_DECLS: &[&str] = &[
    "IMGUI_API ImGuiContext* CreateContext(ImFontAtlas* shared_font_atlas = NULL);",
    "IMGUI_API void DestroyContext(ImGuiContext* ctx = NULL);",
    "IMGUI_API ImGuiContext* GetCurrentContext();",
    "IMGUI_API void SetCurrentContext(ImGuiContext* ctx);",
];

const LIFECYCLE_SHIMS: &str = "\
ImGuiContext* CreateContext(ImFontAtlas* shared_font_atlas)
{
    return ImGuiEx::CreateContext(shared_font_atlas);
}

void DestroyContext(ImGuiContext* ctx)
{
    ImGuiEx::DestroyContext(ctx);
}

ImGuiContext* GetCurrentContext()
{
    return GImGui;
}

void SetCurrentContext(ImGuiContext* ctx)
{
    GImGui = ctx;
}
";

/// The block appended after the last line of the public header.
pub fn render_header_block(apis: &[&FunctionEntry]) -> String {
    let mut out = String::new();
    out.push('\n');
    let _ = writeln!(out, "#ifndef {IMPLICIT_API_GUARD}");
    out.push_str("namespace ImGui\n{\n");
    for decl in LIFECYCLE_DECLS {
        let _ = writeln!(out, "    {decl}");
    }
    for api in apis {
        let _ = writeln!(
            out,
            "    IMGUI_API {} {}({}){};",
            api.return_type,
            api.name,
            declaration_signature(api),
            fmt_suffix(api)
        );
    }
    out.push_str("} // namespace ImGui\n");
    let _ = writeln!(out, "#endif // #ifndef {IMPLICIT_API_GUARD}");
    out
}

/// The generated definitions unit (by convention `imgui_implicit.cpp`).
pub fn render_implicit_unit(apis: &[&FunctionEntry]) -> String {
    let mut out = String::new();
    out.push_str("#include \"imgui.h\"\n");
    out.push_str("#include \"imgui_internal.h\"\n\n");
    out.push_str("ImGuiContext*   GImGui = NULL;\n\n");
    out.push_str("namespace ImGui\n{\n\n");
    out.push_str(LIFECYCLE_SHIMS);
    for api in apis {
        out.push('\n');
        out.push_str(&render_wrapper(api));
    }
    out.push_str("\n} // namespace ImGui\n");
    out
}

/// Parameter list with defaults, `...` appended for formatted-args APIs.
fn declaration_signature(api: &FunctionEntry) -> String {
    let mut parts: Vec<&str> = api.params.iter().map(|p| p.declaration.as_str()).collect();
    if api.fmtargs > 0 {
        parts.push("...");
    }
    parts.iter().join(", ")
}

/// Parameter list without defaults, for the wrapper definitions.
fn definition_signature(api: &FunctionEntry) -> String {
    let mut parts: Vec<String> = api
        .params
        .iter()
        .map(|p| format!("{} {}", p.ty, p.name))
        .collect();
    if api.fmtargs > 0 {
        parts.push("...".to_string());
    }
    parts.iter().join(", ")
}

/// Unchanged annotation suffix; the renumbered indices live only in the
/// explicit-context declarations.
fn fmt_suffix(api: &FunctionEntry) -> String {
    if api.fmtargs > 0 {
        format!(" IM_FMTARGS({})", api.fmtargs)
    } else if api.fmtlist > 0 {
        format!(" IM_FMTLIST({})", api.fmtlist)
    } else {
        String::new()
    }
}

fn render_wrapper(api: &FunctionEntry) -> String {
    let mut args: Vec<String> = Vec::with_capacity(api.params.len() + 2);
    // Only APIs the closure actually extended take the global first.
    if api.need_context_param && api.imgui_context_arg.is_none() {
        args.push("GImGui".to_string());
    }
    args.extend(api.params.iter().map(|p| p.name.clone()));

    let variadic = api.fmtargs > 0;
    let mut callee = api.name.clone();
    if variadic {
        callee.push('V');
        args.push("args".to_string());
    }
    let returns = api.return_type != "void";
    let forward = format!("ImGuiEx::{callee}({})", args.iter().join(", "));

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} {}({})",
        api.return_type,
        api.name,
        definition_signature(api)
    );
    out.push_str("{\n");
    if variadic {
        let last_named = api.params.last().map_or("fmt", |p| p.name.as_str());
        out.push_str("    va_list args;\n");
        let _ = writeln!(out, "    va_start(args, {last_named});");
        if returns {
            let _ = writeln!(out, "    {} ret = {forward};", api.return_type);
            out.push_str("    va_end(args);\n");
            out.push_str("    return ret;\n");
        } else {
            let _ = writeln!(out, "    {forward};");
            out.push_str("    va_end(args);\n");
        }
    } else if returns {
        let _ = writeln!(out, "    return {forward};");
    } else {
        let _ = writeln!(out, "    {forward};");
    }
    out.push_str("}\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::{
        CodeRange, FunctionId, FunctionKind, FunctionParameter,
    };

    fn api(name: &str, ret: &str, params: Vec<FunctionParameter>) -> FunctionEntry {
        FunctionEntry {
            id: FunctionId::new(format!("id{name}")),
            name: name.to_string(),
            fq_name: format!("ImGui::{name}"),
            return_type: ret.to_string(),
            params,
            code_range: CodeRange::from_token("imgui.h", 100, 15, name.len()),
            kind: FunctionKind::Free,
            method_class: None,
            is_api: true,
            is_definition: false,
            fmtargs: 0,
            fmtlist: 0,
            fmtargs_range: None,
            fmtlist_range: None,
            implicit_contexts: Vec::new(),
            imgui_context_arg: None,
            need_context_param: true,
        }
    }

    fn variadic_api(name: &str, ret: &str) -> FunctionEntry {
        let mut e = api(
            name,
            ret,
            vec![FunctionParameter::new(
                "fmt",
                "const char *",
                Some("const char* fmt".into()),
            )],
        );
        e.fmtargs = 1;
        e
    }

    #[test]
    fn header_block_keeps_original_signatures() {
        let begin = api(
            "Begin",
            "bool",
            vec![
                FunctionParameter::new("name", "const char *", Some("const char* name".into())),
                FunctionParameter::new(
                    "p_open",
                    "bool *",
                    Some("bool* p_open = NULL".into()),
                ),
            ],
        );
        let text = variadic_api("Text", "void");
        let block = render_header_block(&[&begin, &text]);

        assert!(block.starts_with("\n#ifndef IMGUI_DISABLE_IMPLICIT_API\n"));
        assert!(block.ends_with("#endif // #ifndef IMGUI_DISABLE_IMPLICIT_API\n"));
        assert!(block.contains(
            "    IMGUI_API bool Begin(const char* name, bool* p_open = NULL);\n"
        ));
        // Original index: the +1 renumbering belongs to the explicit
        // declarations only.
        assert!(block.contains(
            "    IMGUI_API void Text(const char* fmt, ...) IM_FMTARGS(1);\n"
        ));
        assert!(block.contains("ImGuiContext* GetCurrentContext();"));
    }

    #[test]
    fn plain_wrapper_forwards_the_global_first() {
        let begin = api(
            "Begin",
            "bool",
            vec![
                FunctionParameter::new("name", "const char *", Some("const char* name".into())),
                FunctionParameter::new("p_open", "bool *", Some("bool* p_open = NULL".into())),
            ],
        );
        insta::assert_snapshot!(render_wrapper(&begin), @r###"
        bool Begin(const char* name, bool* p_open)
        {
            return ImGuiEx::Begin(GImGui, name, p_open);
        }
        "###);
    }

    #[test]
    fn variadic_wrapper_va_forwards_to_the_v_suffixed_callee() {
        let text = variadic_api("Text", "void");
        let wrapper = render_wrapper(&text);
        assert_eq!(
            wrapper,
            concat!(
                "void Text(const char* fmt, ...)\n",
                "{\n",
                "    va_list args;\n",
                "    va_start(args, fmt);\n",
                "    ImGuiEx::TextV(GImGui, fmt, args);\n",
                "    va_end(args);\n",
                "}\n",
            )
        );
    }

    #[test]
    fn variadic_wrapper_with_return_captures_a_local() {
        let tree = variadic_api("TreeNode", "bool");
        let wrapper = render_wrapper(&tree);
        assert_eq!(
            wrapper,
            concat!(
                "bool TreeNode(const char* fmt, ...)\n",
                "{\n",
                "    va_list args;\n",
                "    va_start(args, fmt);\n",
                "    bool ret = ImGuiEx::TreeNodeV(GImGui, fmt, args);\n",
                "    va_end(args);\n",
                "    return ret;\n",
                "}\n",
            )
        );
    }

    #[test]
    fn context_free_apis_forward_unchanged() {
        let mut version = api("GetVersion", "const char*", Vec::new());
        version.need_context_param = false;
        let wrapper = render_wrapper(&version);
        assert!(wrapper.contains("return ImGuiEx::GetVersion();"));

        let unit = render_implicit_unit(&[&version]);
        assert!(unit.contains("ImGuiContext*   GImGui = NULL;\n"));
        assert!(unit.contains("GImGui = ctx;"));
        assert!(unit.ends_with("} // namespace ImGui\n"));
    }
}
