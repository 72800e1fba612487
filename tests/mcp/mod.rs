mod credential_flow_test;
mod task_tools_test;
