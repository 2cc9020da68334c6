//! Battle Prep Tests
//!
//! Lookups a developer actually performs: framework classes, JDK types,
//! nested and synthetic class names, and the scan-then-decompile workflow.

use super::{call_handled, call_with_result};
use crate::harness::{Fixtures, TestCase};
use crate::mcp::{McpClient, Transport};
use crate::test_case;
use anyhow::{Context, Result};
use serde_json::json;

pub fn tests<T: Transport>() -> Vec<TestCase<T>> {
    vec![
        test_case!(spring_boot_common_classes),
        test_case!(java_standard_library),
        test_case!(common_third_party_libs),
        test_case!(inner_class_names),
        test_case!(array_type_names),
        test_case!(generic_type_signatures),
        test_case!(scan_then_decompile_workflow),
        test_case!(multiple_scans_same_project),
        test_case!(primitive_type_names),
        test_case!(anonymous_class_patterns),
    ]
}

/// Ask `tool` about each class in turn; every call must be answered
async fn lookup_all<T: Transport>(
    client: &McpClient<T>,
    fixtures: &Fixtures,
    tool: &str,
    classes: &[&str],
) -> Result<()> {
    let project = fixtures.project_path();
    for class in classes {
        call_handled(client, tool, json!({"className": class, "projectPath": project}))
            .await
            .with_context(|| format!("{} {}", tool, class))?;
    }
    Ok(())
}

async fn spring_boot_common_classes<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    lookup_all(
        client,
        fixtures,
        "analyze_class",
        &[
            "org.springframework.data.jpa.repository.JpaRepository",
            "org.springframework.web.bind.annotation.RestController",
            "org.springframework.stereotype.Service",
            "org.springframework.context.annotation.Configuration",
        ],
    )
    .await
}

async fn java_standard_library<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    lookup_all(
        client,
        fixtures,
        "analyze_class",
        &[
            "java.util.List",
            "java.util.ArrayList",
            "java.util.Map",
            "java.lang.String",
            "java.io.File",
        ],
    )
    .await
}

async fn common_third_party_libs<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    lookup_all(
        client,
        fixtures,
        "decompile_class",
        &[
            "com.fasterxml.jackson.databind.ObjectMapper",
            "org.apache.commons.lang3.StringUtils",
            "com.google.common.collect.Lists",
            "lombok.Data",
        ],
    )
    .await
}

async fn inner_class_names<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    lookup_all(
        client,
        fixtures,
        "decompile_class",
        &[
            "com.example.OuterClass$InnerClass",
            "com.example.OuterClass$1",
            "com.example.Container$Inner$Nested",
        ],
    )
    .await
}

async fn array_type_names<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    lookup_all(
        client,
        fixtures,
        "analyze_class",
        &["[Ljava.lang.String;", "[I", "[[Ljava.util.List;", "java.lang.String[]"],
    )
    .await
}

async fn generic_type_signatures<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    lookup_all(
        client,
        fixtures,
        "analyze_class",
        &[
            "java.util.List<java.lang.String>",
            "java.util.Map<java.lang.String, java.lang.Integer>",
            "com.example.GenericClass<java.lang.String>",
        ],
    )
    .await
}

async fn scan_then_decompile_workflow<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    let project = fixtures.project_path();
    call_with_result(client, "scan_dependencies", json!({"projectPath": project}))
        .await
        .context("scan step")?;
    call_handled(
        client,
        "decompile_class",
        json!({"className": "com.test.FakeClass", "projectPath": project}),
    )
    .await
    .context("decompile step")?;
    Ok(())
}

async fn multiple_scans_same_project<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    for attempt in 1..=3 {
        call_with_result(
            client,
            "scan_dependencies",
            json!({"projectPath": fixtures.project_path()}),
        )
        .await
        .with_context(|| format!("scan #{}", attempt))?;
    }
    Ok(())
}

async fn primitive_type_names<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    lookup_all(
        client,
        fixtures,
        "analyze_class",
        &["int", "boolean", "void", "byte", "short", "long", "float", "double", "char"],
    )
    .await
}

async fn anonymous_class_patterns<T: Transport>(client: &McpClient<T>, fixtures: &Fixtures) -> Result<()> {
    lookup_all(
        client,
        fixtures,
        "decompile_class",
        &["com.example.Class$1", "com.example.Class$2Local", "com.example.Class$1Enum"],
    )
    .await
}
