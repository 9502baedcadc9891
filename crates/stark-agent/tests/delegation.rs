//! Sub-agent delegation through the runner.

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{FakeConnector, ScriptedGateway, call, calls, mcp_server, text};
use serde_json::json;
use stark_agent::{AgentError, AgentSpec, Message, Role, Runner};

fn agent(name: &str, model: &str) -> stark_agent::AgentSpecBuilder {
    AgentSpec::builder(name)
        .description(format!("The {name} agent."))
        .instructions(format!("You are {name}."))
        .model(model)
}

#[tokio::test]
async fn sub_agent_result_is_recorded_under_its_name() {
    let researcher = agent("researcher", "child").build().unwrap();
    let root = agent("root", "parent").sub_agent(researcher).build().unwrap();
    let gateway = ScriptedGateway::new()
        .script(
            "parent",
            vec![
                call("c1", "sub_agent__researcher", json!({"input": "find the capital of Peru"})),
                text("Lima, apparently."),
            ],
        )
        .script("child", vec![text("Lima")])
        .into_arc();

    let result = Runner::new(root, gateway.clone())
        .run_async(vec![Message::user("capital of Peru?")])
        .await
        .unwrap();

    // The parent sees the sub-agent as a tool.
    let offered: Vec<_> = gateway.requests_for("parent")[0]
        .tools
        .iter()
        .map(|t| (t.name.clone(), t.description.clone()))
        .collect();
    assert_eq!(
        offered,
        vec![("sub_agent__researcher".to_string(), "The researcher agent.".to_string())]
    );

    // The child starts fresh from the delegated input.
    assert_eq!(
        gateway.requests_for("child")[0].messages,
        vec![
            Message::system("You are researcher."),
            Message::user("find the capital of Peru"),
        ]
    );

    let tool_turn = result.result.iter().find(|m| m.role == Role::Tool).unwrap();
    assert_eq!(tool_turn.content, "Lima");
    assert!(!tool_turn.is_error);

    let nested = &result.sub_agents_response["researcher"];
    assert_eq!(nested.agent_name, "researcher");
    assert_eq!(nested.final_output(), Some("Lima"));
    assert_eq!(nested.iterations, 1);

    assert_eq!(result.sub_agent_result.len(), 1);
    let record = &result.sub_agent_result[0];
    assert_eq!(record.agent_name, "researcher");
    assert_eq!(record.path, vec!["root", "researcher"]);
    assert_eq!(record.tool_call_id, "c1");
    assert!(record.success);
    assert_eq!(record.output.as_deref(), Some("Lima"));
    assert_eq!(result.final_output(), Some("Lima, apparently."));
}

#[tokio::test]
async fn records_are_depth_first_across_levels() {
    let leaf = agent("leaf", "leaf").build().unwrap();
    let mid = agent("mid", "mid").sub_agent(leaf).build().unwrap();
    let other = agent("other", "other").build().unwrap();
    let root = agent("root", "root")
        .sub_agent(mid)
        .sub_agent(other)
        .build()
        .unwrap();

    let gateway = ScriptedGateway::new()
        .script(
            "root",
            vec![
                calls(&[
                    ("r1", "sub_agent__mid", json!({"input": "go deep"})),
                    ("r2", "sub_agent__other", json!({"input": "go wide"})),
                ]),
                text("finished"),
            ],
        )
        .script(
            "mid",
            vec![call("m1", "sub_agent__leaf", json!({"input": "bottom"})), text("mid done")],
        )
        .script("leaf", vec![text("leaf done")])
        .script("other", vec![text("other done")])
        .into_arc();

    let result = Runner::new(root, gateway)
        .run_async(vec![Message::user("start")])
        .await
        .unwrap();

    let order: Vec<(String, Vec<String>)> = result
        .sub_agent_result
        .iter()
        .map(|r| (r.agent_name.clone(), r.path.clone()))
        .collect();
    assert_eq!(
        order,
        vec![
            ("mid".to_string(), vec!["root".to_string(), "mid".to_string()]),
            (
                "leaf".to_string(),
                vec!["root".to_string(), "mid".to_string(), "leaf".to_string()]
            ),
            ("other".to_string(), vec!["root".to_string(), "other".to_string()]),
        ]
    );

    // Only direct sub-agents are keyed at each level.
    let keys: Vec<_> = result.sub_agents_response.keys().cloned().collect();
    assert_eq!(keys, vec!["mid", "other"]);
    let mid = &result.sub_agents_response["mid"];
    assert_eq!(mid.sub_agents_response["leaf"].final_output(), Some("leaf done"));
    assert_eq!(mid.sub_agent_result.len(), 1);
}

#[tokio::test]
async fn latest_invocation_wins_in_the_response_map() {
    let helper = agent("helper", "child").build().unwrap();
    let root = agent("root", "parent").sub_agent(helper).build().unwrap();
    let gateway = ScriptedGateway::new()
        .script(
            "parent",
            vec![
                call("c1", "sub_agent__helper", json!({"input": "first"})),
                call("c2", "sub_agent__helper", json!({"input": "second"})),
                text("done"),
            ],
        )
        .script("child", vec![text("one"), text("two")])
        .into_arc();

    let result = Runner::new(root, gateway)
        .run_async(vec![Message::user("twice")])
        .await
        .unwrap();

    assert_eq!(result.sub_agent_result.len(), 2);
    assert_eq!(result.sub_agents_response.len(), 1);
    assert_eq!(result.sub_agents_response["helper"].final_output(), Some("two"));
}

#[tokio::test]
async fn missing_input_seeds_from_parent_text_turns() {
    let helper = agent("helper", "child").build().unwrap();
    let root = agent("root", "parent").sub_agent(helper).build().unwrap();
    let gateway = ScriptedGateway::new()
        .script(
            "parent",
            vec![call("c1", "sub_agent__helper", json!({})), text("done")],
        )
        .script("child", vec![text("helped")])
        .into_arc();

    Runner::new(root, gateway.clone())
        .run_async(vec![Message::user("plan my week")])
        .await
        .unwrap();

    assert_eq!(
        gateway.requests_for("child")[0].messages,
        vec![Message::system("You are helper."), Message::user("plan my week")]
    );
}

#[tokio::test]
async fn failed_sub_agent_becomes_a_failed_tool_result() {
    let flaky = agent("flaky", "child")
        .tool(stark_agent::FnTool::new("check_disk", "checks the disk", json!({"type": "object"}), |_| async {
            Ok("ok".to_string())
        }))
        .build()
        .unwrap();
    let root = agent("root", "parent").sub_agent(flaky).build().unwrap();
    // One full iteration in the sub-agent, then the backend gives out.
    let gateway = ScriptedGateway::new()
        .script(
            "parent",
            vec![call("c1", "sub_agent__flaky", json!({"input": "try"})), text("gave up")],
        )
        .script("child", vec![call("s1", "check_disk", json!({}))])
        .fail("child", "model overloaded")
        .into_arc();

    let result = Runner::new(root, gateway)
        .run_async(vec![Message::user("go")])
        .await
        .unwrap();

    let tool_turn = result.result.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_turn.is_error);
    assert!(tool_turn.content.contains("model overloaded"));

    assert!(result.sub_agents_response.is_empty());
    let record = &result.sub_agent_result[0];
    assert!(!record.success);
    assert_eq!(record.iterations, 0);
    assert!(record.error.as_deref().unwrap().contains("flaky"));
    assert_eq!(result.final_output(), Some("gave up"));
}

#[tokio::test]
async fn sub_agent_whose_mcp_server_cannot_start_fails_only_its_call() {
    // A directory is not an executable, so the launch fails after lookup.
    let dir = tempfile::tempdir().unwrap();
    let command = dir.path().to_string_lossy().into_owned();
    let worker = agent("worker", "child")
        .mcp_server("fs", stark_agent::McpServerConfig::new(command))
        .build()
        .unwrap();
    let root = agent("root", "parent").sub_agent(worker).build().unwrap();
    let gateway = ScriptedGateway::new()
        .script(
            "parent",
            vec![call("c1", "sub_agent__worker", json!({"input": "list files"})), text("recovered")],
        )
        .into_arc();

    let result = Runner::new(root, gateway.clone())
        .run_async(vec![Message::user("go")])
        .await
        .unwrap();

    assert_eq!(result.final_output(), Some("recovered"));
    assert_eq!(gateway.requests_for("parent").len(), 2);
    assert!(gateway.requests_for("child").is_empty());

    let tool_turn = result.result.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_turn.is_error);
    assert!(tool_turn.content.contains("failed to start"));
    assert!(!result.sub_agent_result[0].success);
}

#[tokio::test]
async fn sub_agent_hitting_its_cap_reports_no_final_answer() {
    let stuck = agent("stuck", "child")
        .tool(stark_agent::FnTool::new("spin", "spins", json!({"type": "object"}), |_| async {
            Ok("again".to_string())
        }))
        .max_iterations(2)
        .build()
        .unwrap();
    let root = agent("root", "parent").sub_agent(stuck).build().unwrap();
    let gateway = ScriptedGateway::new()
        .script(
            "parent",
            vec![call("c1", "sub_agent__stuck", json!({"input": "loop"})), text("ok")],
        )
        .repeat("child", call("s1", "spin", json!({})))
        .into_arc();

    let result = Runner::new(root, gateway)
        .run_async(vec![Message::user("go")])
        .await
        .unwrap();

    let record = &result.sub_agent_result[0];
    assert!(record.max_iterations_reached);
    assert_eq!(record.iterations, 2);
    let tool_turn = result.result.iter().find(|m| m.role == Role::Tool).unwrap();
    assert!(tool_turn.content.contains("no final answer"));
}

#[tokio::test]
async fn cyclic_agent_graph_fails_fast() {
    // Assembled by hand, since the builder refuses cycles.
    let inner = Arc::new(agent("loop", "m").build().unwrap());
    let middle = Arc::new(agent("middle", "m").sub_agent_arc(inner).build().unwrap());
    let root = AgentSpec {
        name: "loop".into(),
        description: String::new(),
        instructions: String::new(),
        model: "m".into(),
        provider: "openai".into(),
        function_tools: Vec::new(),
        mcp_servers: BTreeMap::new(),
        sub_agents: vec![middle],
        parallel_tool_calls: None,
        max_iterations: 5,
        max_output_tokens: None,
        trace_id: None,
    };
    let gateway = ScriptedGateway::new().script("m", vec![text("unused")]).into_arc();

    let err = Runner::new(root, gateway.clone())
        .run_async(vec![Message::user("go")])
        .await
        .unwrap_err();

    match err {
        AgentError::DelegationCycle { path } => assert_eq!(path, vec!["loop", "middle", "loop"]),
        other => panic!("unexpected error: {other}"),
    }
    assert!(gateway.requests().is_empty());
}

#[tokio::test]
async fn sub_agents_own_their_mcp_sessions() {
    let worker = agent("worker", "child")
        .mcp_server("fs", mcp_server())
        .build()
        .unwrap();
    let root = agent("root", "parent").sub_agent(worker).build().unwrap();
    let connector = Arc::new(FakeConnector::with_tools(vec!["read_file"]));
    let gateway = ScriptedGateway::new()
        .script(
            "parent",
            vec![call("c1", "sub_agent__worker", json!({"input": "read"})), text("done")],
        )
        .script(
            "child",
            vec![call("w1", "read_file", json!({"path": "a.txt"})), text("read a.txt")],
        )
        .into_arc();

    let result = Runner::new(root, gateway.clone())
        .with_mcp_connector(connector.clone())
        .run_async(vec![Message::user("go")])
        .await
        .unwrap();

    // The parent never sees the worker's MCP tools.
    assert_eq!(gateway.requests_for("parent")[0].tools.len(), 1);
    assert_eq!(gateway.requests_for("child")[0].tools[0].name, "read_file");

    assert_eq!(connector.connected_agents(), vec!["worker"]);
    assert_eq!(connector.close_count(), 1);
    assert_eq!(result.sub_agent_result[0].output.as_deref(), Some("read a.txt"));
}
