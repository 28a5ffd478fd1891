//! Tests for the command tools

#[cfg(test)]
mod tests {
    use localmcp::config::{CommandConfig, Config};
    use localmcp::mcp::McpServer;
    use localmcp::registry::ToolRegistry;
    use localmcp::tasks::{TaskManager, TIMEOUT_MARKER};
    use localmcp::tools::build_registry;
    use localmcp::{Arguments, CallContext, ToolError, ToolResult};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        dir: TempDir,
        registry: ToolRegistry,
    }

    fn fixture() -> Fixture {
        fixture_with(|_| {})
    }

    fn fixture_with(configure: impl FnOnce(&mut CommandConfig)) -> Fixture {
        let dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.command.default_shell = "/bin/sh".to_string();
        config.command.working_directory = Some(dir.path().to_path_buf());
        configure(&mut config.command);
        let tasks = Arc::new(TaskManager::new(config.task_settings()));
        let registry = build_registry(&config, tasks).unwrap();
        Fixture { dir, registry }
    }

    async fn call(fx: &Fixture, name: &str, args: Value) -> Result<ToolResult, ToolError> {
        let tool = fx.registry.get(name).unwrap_or_else(|| panic!("tool {name} not registered"));
        tool.call(CallContext::detached(), Arguments::from_value(args).unwrap()).await
    }

    fn json_of(result: &ToolResult) -> Value {
        serde_json::from_str(&result.text_content()).unwrap()
    }

    async fn poll_until_terminal(fx: &Fixture, id: &str) -> Value {
        for _ in 0..200 {
            let status = json_of(&call(fx, "get_command_status", json!({"command_id": id})).await.unwrap());
            if status["status"] != "running" {
                return status;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        panic!("command {id} did not finish");
    }

    // ==================== Registration ====================

    #[test]
    fn test_all_command_tools_registered() {
        let fx = fixture();
        let names: Vec<String> = fx.registry.list().into_iter().map(|t| t.name).collect();
        for expected in [
            "cancel_command",
            "get_command_status",
            "get_shell_info",
            "list_commands",
            "remove_command",
            "run_command",
            "run_command_async",
            "run_script",
        ] {
            assert!(names.iter().any(|n| n == expected), "missing {expected}");
        }
    }

    #[test]
    fn test_disabled_commands_register_nothing() {
        let fx = fixture_with(|c| c.enabled = false);
        assert!(fx.registry.is_empty());
    }

    // ==================== run_command ====================

    #[tokio::test]
    async fn test_run_command() {
        let fx = fixture();
        let result = call(&fx, "run_command", json!({"command": "echo", "args": ["hello", "world"]}))
            .await
            .unwrap();
        let output = json_of(&result);
        assert_eq!(output["exit_code"], 0);
        assert_eq!(output["stdout"], "hello world\n");
        assert!(output.get("timed_out").is_none());
    }

    #[tokio::test]
    async fn test_run_command_uses_working_directory() {
        let fx = fixture();
        std::fs::write(fx.dir.path().join("marker.txt"), "").unwrap();
        let output = json_of(&call(&fx, "run_command", json!({"command": "ls"})).await.unwrap());
        assert!(output["stdout"].as_str().unwrap().contains("marker.txt"));
    }

    #[tokio::test]
    async fn test_run_command_env() {
        let fx = fixture();
        let output = json_of(
            &call(
                &fx,
                "run_command",
                json!({"command": "sh", "args": ["-c", "echo $TOOL_VAR"], "env": {"TOOL_VAR": "set"}}),
            )
            .await
            .unwrap(),
        );
        assert_eq!(output["stdout"], "set\n");
    }

    #[tokio::test]
    async fn test_run_command_timeout() {
        let fx = fixture();
        let output = json_of(
            &call(&fx, "run_command", json!({"command": "sleep", "args": ["10"], "timeout_seconds": 1}))
                .await
                .unwrap(),
        );
        assert_eq!(output["timed_out"], true);
        assert_eq!(output["exit_code"], -1);
        assert_eq!(output["stderr"], TIMEOUT_MARKER);
    }

    #[tokio::test]
    async fn test_run_command_missing_command() {
        let fx = fixture();
        let err = call(&fx, "run_command", json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::MissingParam(ref name) if name == "command"));
    }

    #[tokio::test]
    async fn test_run_command_bad_args_type() {
        let fx = fixture();
        let err = call(&fx, "run_command", json!({"command": "echo", "args": "nope"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidParam { .. }));
    }

    #[tokio::test]
    async fn test_denied_command_rejected() {
        let fx = fixture();
        let err = call(&fx, "run_command", json!({"command": "sudo", "args": ["ls"]}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Denied(_)));
    }

    #[tokio::test]
    async fn test_allow_list_enforced() {
        let fx = fixture_with(|c| c.allowed_commands = vec!["echo".to_string()]);
        assert!(call(&fx, "run_command", json!({"command": "echo", "args": ["ok"]})).await.is_ok());
        let err = call(&fx, "run_command", json!({"command": "ls"})).await.unwrap_err();
        assert!(matches!(err, ToolError::Denied(_)));
    }

    // ==================== Async commands ====================

    #[tokio::test]
    async fn test_async_command_lifecycle() {
        let fx = fixture();
        let started = json_of(
            &call(&fx, "run_command_async", json!({"command": "sh", "args": ["-c", "echo background"]}))
                .await
                .unwrap(),
        );
        assert_eq!(started["status"], "running");
        let id = started["command_id"].as_str().unwrap().to_string();

        let status = poll_until_terminal(&fx, &id).await;
        assert_eq!(status["status"], "completed");
        assert_eq!(status["exit_code"], 0);
        assert_eq!(status["stdout"], "background\n");
        assert_eq!(status["command_id"], id.as_str());
    }

    #[tokio::test]
    async fn test_cancel_command() {
        let fx = fixture();
        let started = json_of(
            &call(&fx, "run_command_async", json!({"command": "sleep", "args": ["10"]}))
                .await
                .unwrap(),
        );
        let id = started["command_id"].as_str().unwrap().to_string();

        let result = call(&fx, "cancel_command", json!({"command_id": id})).await.unwrap();
        assert_eq!(result.text_content(), format!("Command {id} cancelled"));

        let err = call(&fx, "cancel_command", json!({"command_id": id})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));

        let status = json_of(&call(&fx, "get_command_status", json!({"command_id": id})).await.unwrap());
        assert_eq!(status["status"], "cancelled");
        assert_eq!(status["exit_code"], Value::Null);
    }

    #[tokio::test]
    async fn test_status_unknown_command() {
        let fx = fixture();
        let err = call(&fx, "get_command_status", json!({"command_id": "nope"})).await.unwrap_err();
        assert_eq!(err.to_string(), "command not found: nope");
    }

    #[tokio::test]
    async fn test_async_spawn_failure() {
        let fx = fixture();
        let err = call(&fx, "run_command_async", json!({"command": "definitely-not-a-real-program-xyz"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Task(_)));
        let listed = json_of(&call(&fx, "list_commands", json!({})).await.unwrap());
        assert_eq!(listed, json!([]));
    }

    #[tokio::test]
    async fn test_list_and_remove_commands() {
        let fx = fixture();
        let started = json_of(&call(&fx, "run_command_async", json!({"command": "true"})).await.unwrap());
        let id = started["command_id"].as_str().unwrap().to_string();
        poll_until_terminal(&fx, &id).await;

        let listed = json_of(&call(&fx, "list_commands", json!({})).await.unwrap());
        assert_eq!(listed.as_array().unwrap().len(), 1);
        assert_eq!(listed[0]["command_id"], id.as_str());
        assert_eq!(listed[0]["command"], "true");

        let removed = call(&fx, "remove_command", json!({"command_id": id})).await.unwrap();
        assert_eq!(removed.text_content(), format!("Command {id} removed"));
        let listed = json_of(&call(&fx, "list_commands", json!({})).await.unwrap());
        assert_eq!(listed, json!([]));
    }

    // ==================== run_script ====================

    #[tokio::test]
    async fn test_run_script() {
        let fx = fixture();
        let script = fx.dir.path().join("hello.sh");
        std::fs::write(&script, "echo \"from script $1\"\n").unwrap();

        let output = json_of(
            &call(&fx, "run_script", json!({"path": script.to_str().unwrap(), "args": ["arg1"]}))
                .await
                .unwrap(),
        );
        assert_eq!(output["exit_code"], 0);
        assert_eq!(output["stdout"], "from script arg1\n");
    }

    #[tokio::test]
    async fn test_run_script_relative_to_working_directory() {
        let fx = fixture();
        std::fs::write(fx.dir.path().join("relative.sh"), "echo relative ok\n").unwrap();

        let output = json_of(&call(&fx, "run_script", json!({"path": "relative.sh"})).await.unwrap());
        assert_eq!(output["exit_code"], 0);
        assert_eq!(output["stdout"], "relative ok\n");
    }

    #[tokio::test]
    async fn test_run_script_relative_to_cwd_argument() {
        let fx = fixture();
        let nested = fx.dir.path().join("nested");
        std::fs::create_dir(&nested).unwrap();
        std::fs::write(nested.join("inner.sh"), "echo inner ok\n").unwrap();

        // Not present under the default working directory
        let err = call(&fx, "run_script", json!({"path": "inner.sh"})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));

        let output = json_of(
            &call(&fx, "run_script", json!({"path": "inner.sh", "cwd": nested.to_str().unwrap()}))
                .await
                .unwrap(),
        );
        assert_eq!(output["stdout"], "inner ok\n");
    }

    #[tokio::test]
    async fn test_run_script_missing_file() {
        let fx = fixture();
        let path = fx.dir.path().join("absent.sh");
        let err = call(&fx, "run_script", json!({"path": path.to_str().unwrap()})).await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
        assert!(err.to_string().starts_with("script not found"));
    }

    // ==================== get_shell_info ====================

    #[tokio::test]
    async fn test_shell_info() {
        let fx = fixture();
        let info = json_of(&call(&fx, "get_shell_info", json!({})).await.unwrap());
        assert_eq!(info["os"], std::env::consts::OS);
        assert_eq!(info["default_shell"], "/bin/sh");
        let shells = info["available_shells"].as_array().unwrap();
        assert!(shells.iter().any(|s| s == "/bin/sh"));
        assert!(info["shell_versions"].is_object());
    }

    // ==================== Through the dispatcher ====================

    #[tokio::test]
    async fn test_run_command_over_stdio_frames() {
        let fx = fixture();
        let server = McpServer::new("localmcp", "test", Arc::new(fx.registry));
        let input = [
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize"}"#,
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"run_command","arguments":{"command":"echo","args":["via rpc"]}}}"#,
            r#"{"jsonrpc":"2.0","id":3,"method":"tools/call","params":{"name":"run_command","arguments":{"command":"sudo"}}}"#,
        ]
        .join("\n");

        let mut output = Vec::new();
        server.run(input.as_bytes(), &mut output).await.unwrap();
        let responses: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(responses.len(), 3);
        let text = responses[1]["result"]["content"][0]["text"].as_str().unwrap();
        let run: Value = serde_json::from_str(text).unwrap();
        assert_eq!(run["stdout"], "via rpc\n");

        assert_eq!(responses[2]["result"]["isError"], true);
        assert!(responses[2]["result"]["content"][0]["text"]
            .as_str()
            .unwrap()
            .contains("denied"));
    }
}
