mod common;

use bfrt::{
    BfRtInfo, DataFieldType, DeviceConfig, Error, KeyFieldType, PipelineDocument, ProgramConfig,
    RefCategory, StaticPipeDriver, TableAttribute, TableKey, TableKind, TableOperation,
    UNPACKED_OFFSET,
};
use common::*;
use serde_json::json;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

#[test]
fn tables_and_kinds() {
    let info = load();
    assert_eq!(info.program_name(), "tna");
    let names: Vec<&str> = info.tables().iter().map(|t| t.name.as_str()).collect();
    assert_eq!(
        names,
        vec![
            "$PORT",
            "pipe.egress.cnt",
            "pipe.ingress.ap",
            "pipe.ingress.cnt",
            "pipe.ingress.ecmp",
            "pipe.ingress.fwd",
            "pipe.ingress.mtr",
            "pipe.ingress.port_md",
            "pipe.ingress.reg",
            "pipe.ingress.sel",
        ]
    );
    assert_eq!(info.table_by_id(FWD).unwrap().kind, TableKind::MatchDirect);
    assert_eq!(info.table_by_id(ECMP).unwrap().kind, TableKind::MatchIndirectSelector);
    assert_eq!(info.table_by_id(PORT).unwrap().kind, TableKind::PortCfg);
    assert_eq!(info.table_by_id(PORT_MD).unwrap().pipeline.as_deref(), Some("pipe"));
    assert_eq!(info.table_by_id(PORT).unwrap().pipeline, None);
}

#[test]
fn name_resolution() {
    let info = load();
    assert_eq!(info.table("pipe.ingress.fwd").unwrap().id, FWD);
    assert_eq!(info.table("ingress.fwd").unwrap().id, FWD);
    assert_eq!(info.table("fwd").unwrap().id, FWD);
    assert_eq!(info.table("ingress.cnt").unwrap().id, CNT);
    assert_eq!(info.table("egress.cnt").unwrap().id, EGRESS_CNT);
    assert_eq!(info.table("$PORT").unwrap().id, PORT);

    // Both counters end in "cnt".
    assert!(matches!(info.table("cnt"), Err(Error::NotFound(_))));
    assert!(matches!(info.table("nosuch"), Err(Error::NotFound(_))));
    assert!(matches!(info.table_by_id(0x7777), Err(Error::NotFound(_))));
    assert_eq!(info.table("fwd").unwrap().unqualified_name(), "ingress.fwd");
}

#[test]
fn optimized_out_tables() {
    let info = load();
    assert!(info.is_optimized_out("pipe.ingress.unused"));
    let err = info.table("pipe.ingress.unused").unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
    assert!(err.to_string().contains("optimized out"));
}

#[test]
fn key_offsets_follow_positions() {
    let info = load();
    let fwd = info.table_by_id(FWD).unwrap();
    let dst = fwd.key_field(1).unwrap();
    let port = fwd.key_field(2).unwrap();
    assert_eq!(port.offset, 0);
    assert_eq!(dst.offset, 2);
    assert_eq!(port.parent_field_full_byte_size, 2);
    assert!(!port.is_field_slice);
    assert!(!dst.is_field_slice);
    assert_eq!(dst.match_kind, KeyFieldType::Lpm);
    assert_eq!((fwd.key_size.bytes, fwd.key_size.bits), (6, 41));
    assert!(fwd.is_ternary);
    assert!(!info.table_by_id(ECMP).unwrap().is_ternary);
}

#[test]
fn handles_are_masked() {
    let info = load();
    let fwd = info.table_by_id(FWD).unwrap();
    assert_eq!(fwd.handle, MASK | 0x11);
    assert_eq!(info.table_id_from_handle(MASK | 0x11).unwrap(), FWD);
    assert!(info.table_id_from_handle(0x11).is_err());

    let send = fwd.action(SEND).unwrap();
    assert_eq!(send.act_fn_hdl, 0x2100_0011);
    assert_eq!(fwd.act_fn_hdl_to_id[&0x2100_0011], SEND);
    assert_eq!(fwd.act_fn_hdl_to_id[&0x2100_0012], DROP);
    assert_eq!(info.table_by_id(PORT).unwrap().handle, 0);
}

#[test]
fn action_parameters_are_classified() {
    let info = load();
    let fwd = info.table_by_id(FWD).unwrap();
    let send = fwd.action(SEND).unwrap();
    let port = send.field_by_name("port").unwrap();
    let idx = send.field_by_name("idx").unwrap();
    let gone = send.field_by_name("gone").unwrap();
    assert!(port.has_type(DataFieldType::ActionParam));
    assert!(idx.has_type(DataFieldType::CounterIndex));
    assert!(!idx.has_type(DataFieldType::ActionParam));
    assert!(gone.has_type(DataFieldType::ActionParamOptimizedOut));
    assert_eq!((port.offset, idx.offset, gone.offset), (0, 2, 4));
    assert_eq!((send.data_size, send.data_size_bits), (5, 27));
    assert!(port.mandatory);
    assert_eq!(fwd.max_data_size(), 5);

    let counter = fwd.data_field(65553, None).unwrap();
    assert!(counter.has_type(DataFieldType::CounterSpecPackets));
    assert_eq!(fwd.operations.iter().copied().collect::<Vec<_>>(), vec![TableOperation::CounterSync]);
    assert!(fwd.attributes.contains(&TableAttribute::IdleTimeout));
}

#[test]
fn placement_only_actions() {
    let info = load();

    // Only phase0 tables may publish actions the schema lacks.
    let fwd = info.table_by_id(FWD).unwrap();
    assert!(fwd.absent_actions.contains("ingress.hidden"));
    assert!(fwd.action_by_name("ingress.hidden").is_err());

    let phase0 = info.table_by_id(PORT_MD).unwrap();
    assert!(phase0.absent_actions.is_empty());
    let action = phase0.action_by_name("ingress.set_port_metadata").unwrap();
    assert_eq!(action.id, 0x2100_00a1);
    assert_eq!(action.act_fn_hdl, 0x2100_00a1);
    assert_eq!(action.data_size, 3);
    let lag = phase0.data_field_by_name("ig_md.lag", Some(action.id)).unwrap();
    let vrf = phase0.data_field_by_name("ig_md.vrf", Some(action.id)).unwrap();
    assert!(lag.has_type(DataFieldType::ActionParam));
    assert_eq!((lag.offset, vrf.offset), (0, 2));
}

#[test]
fn references() {
    let info = load();
    let fwd = info.table_by_id(FWD).unwrap();
    let stats = fwd.refs(RefCategory::Statistics);
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].name, "pipe.ingress.cnt");
    assert_eq!(stats[0].id, CNT);
    assert_eq!(stats[0].handle, MASK | 0x31);
    assert!(stats[0].indirect);

    let ecmp = info.table_by_id(ECMP).unwrap();
    let meter = &ecmp.refs(RefCategory::Meter)[0];
    assert!(!meter.indirect);
    assert_eq!(meter.id, MTR);
    assert_eq!(ecmp.act_prof_id, Some(AP));
    assert_eq!(ecmp.selector_id, Some(SEL));

    // The action profile inherits its user's resources.
    let ap = info.table_by_id(AP).unwrap();
    let inherited = &ap.refs(RefCategory::Meter)[0];
    assert_eq!(inherited.id, MTR);
    assert!(inherited.indirect);
    let set_port = ap.action(SET_PORT).unwrap();
    assert_eq!(set_port.act_fn_hdl, 0x2100_0021);
    assert!(set_port.data_fields[&1].has_type(DataFieldType::ActionParam));
}

#[test]
fn selectors_find_their_action_profile() {
    let info = load();
    let sel = info.table_by_id(SEL).unwrap();
    let bound = &sel.refs(RefCategory::ActionData)[0];
    assert_eq!(bound.name, "pipe.ingress.ap");
    assert_eq!(bound.handle, MASK | 0x41);
    assert!(bound.indirect);
    assert_eq!(sel.act_prof_id, Some(AP));
    assert!(sel.data_field(1, None).unwrap().has_type(DataFieldType::SelectorMembers));
    assert_eq!(sel.data_field(3, None).unwrap().default_value, 120);
}

#[test]
fn dependency_edges_are_symmetric() {
    let info = load();
    assert_eq!(info.depends_on(ECMP).unwrap(), vec![AP, SEL]);
    assert_eq!(info.dependents(AP).unwrap(), &[ECMP, SEL]);
    assert_eq!(info.dependents(SEL).unwrap(), &[ECMP]);
    for table in info.tables() {
        for dep in info.depends_on(table.id).unwrap() {
            assert!(info.dependents(dep).unwrap().contains(&table.id));
        }
    }
    assert!(info.dependents(CNT).unwrap().is_empty());
    assert!(matches!(info.dependents(0x7777), Err(Error::NotFound(_))));
}

#[test]
fn registers_and_ghosts() {
    let info = load();
    let reg = info.table_by_id(REG).unwrap();
    assert!(reg.data_field(1, None).unwrap().has_type(DataFieldType::RegisterSpecLo));
    assert!(reg.data_field(2, None).unwrap().has_type(DataFieldType::RegisterSpecHi));
    assert_eq!(reg.ghost_handle, Some(0x91));
    assert!(reg.attributes.contains(&TableAttribute::EntryScope));
    assert!(reg.operations.contains(&TableOperation::RegisterSync));
    assert_eq!(info.table_by_id(CNT).unwrap().ghost_handle, None);
}

#[test]
fn fixed_tables() {
    let info = load();
    let port = info.table_by_id(PORT).unwrap();
    assert_eq!(port.key_field(1).unwrap().offset, 0);
    assert_eq!(
        port.attributes.iter().copied().collect::<Vec<_>>(),
        vec![TableAttribute::PortStatusNotif]
    );
    let speed = port.data_field(1, None).unwrap();
    assert_eq!(speed.choices, vec!["BF_SPEED_10G", "BF_SPEED_100G"]);
    assert_eq!(speed.default_str_value, "INVALID");
    assert!(speed.mandatory);
}

#[test]
fn shared_program_has_only_fixed_tables() {
    let info = BfRtInfo::from_documents("$SHARED", &[schema()], vec![pipeline()]).unwrap();
    assert!(info.tables().iter().all(|t| t.handle == 0));
    assert!(info.table("$PORT").is_ok());
    assert!(info.pipelines().is_empty());
}

fn one_table(schema_table: serde_json::Value, context_table: serde_json::Value) -> BfRtInfo {
    let schema = json!({"tables": [schema_table]});
    let pipeline = PipelineDocument {
        name: "pipe".to_string(),
        mask: 0,
        context: json!({"tables": [context_table]}),
    };
    BfRtInfo::from_documents("p", &[schema], vec![pipeline]).unwrap()
}

fn match_table(key: serde_json::Value, actions: serde_json::Value) -> serde_json::Value {
    json!({"name": "pipe.t", "id": 7, "table_type": "MatchAction_Direct", "size": 16,
           "key": key, "action_specs": actions, "data": []})
}

#[test]
fn nested_stage_tables_hold_immediates() {
    let actions = json!([{"id": 1, "name": "a", "data": [
        {"id": 1, "name": "p", "type": {"type": "bytes", "width": 8}}
    ]}]);
    let key = json!([{"id": 1, "name": "f", "match_type": "Exact",
                      "type": {"type": "bytes", "width": 8}}]);
    let action_ctx = json!([{"name": "a", "handle": 0x2000_0001}]);
    let formats = json!([{"action_handle": 0x2000_0001,
                          "immediate_fields": [{"param_name": "p"}]}]);
    let fields = json!([{"name": "f", "position": 0, "bit_width_full": 8, "start_bit": 0}]);

    let alpm = one_table(
        match_table(key.clone(), actions.clone()),
        json!({"name": "t", "handle": 1, "actions": action_ctx, "match_key_fields": fields,
               "match_attributes": {"pre_classifier": {}, "atcam_table": {"match_attributes": {
                   "units": [{"match_attributes": {"stage_tables": [{"action_format": formats}]}}]
               }}}}),
    );
    let p = alpm.table("t").unwrap().data_field(1, Some(1)).unwrap();
    assert!(p.has_type(DataFieldType::ActionParam));

    let atcam = one_table(
        match_table(key.clone(), actions.clone()),
        json!({"name": "t", "handle": 1, "actions": action_ctx, "match_key_fields": fields,
               "match_attributes": {"match_type": "algorithmic_tcam", "units": [
                   {"match_attributes": {"stage_tables": [
                       {"ternary_indirection_stage_table": {"action_format": formats}}
                   ]}}
               ]}}),
    );
    let table = atcam.table("t").unwrap();
    assert!(table.data_field(1, Some(1)).unwrap().has_type(DataFieldType::ActionParam));
    assert!(table.is_ternary);

    // An immediate of another action does not count.
    let other = one_table(
        match_table(key, actions),
        json!({"name": "t", "handle": 1, "actions": action_ctx, "match_key_fields": fields,
               "match_attributes": {"stage_tables": [{"action_format": [
                   {"action_handle": 0x2000_0002, "immediate_fields": [{"param_name": "p"}]}
               ]}]}}),
    );
    let p = other.table("t").unwrap().data_field(1, Some(1)).unwrap();
    assert!(p.has_type(DataFieldType::ActionParamOptimizedOut));
}

#[test]
fn slices_priorities_and_partitions() {
    let key = json!([
        {"id": 1, "name": "hdr.vlan.vid[11:4]", "match_type": "Ternary",
         "annotations": [{"name": "isFieldSlice", "value": "true"}],
         "type": {"type": "bytes", "width": 8}},
        {"id": 2, "name": "$MATCH_PRIORITY", "match_type": "Exact", "type": {"type": "uint32"}},
        {"id": 3, "name": "ig_md.part", "match_type": "ATCAM", "type": {"type": "bytes", "width": 4}}
    ]);
    let info = one_table(
        match_table(key, json!([])),
        json!({"name": "t", "handle": 1, "actions": [],
               "match_key_fields": [
                   {"name": "hdr.vlan.vid", "position": 0, "bit_width_full": 12, "start_bit": 0},
                   {"name": "ig_md.part", "position": 1, "bit_width_full": 4, "start_bit": 0}
               ],
               "match_attributes": {"match_type": "algorithmic_tcam",
                                    "partition_field_name": "ig_md.part", "units": []}}),
    );
    let t = info.table("t").unwrap();
    let slice = t.key_field(1).unwrap();
    assert!(slice.is_field_slice);
    assert_eq!(slice.start_bit, 4);
    assert_eq!((slice.offset, slice.parent_field_full_byte_size), (0, 2));
    let priority = t.key_field(2).unwrap();
    assert_eq!(priority.offset, UNPACKED_OFFSET);
    assert_eq!(priority.parent_field_full_byte_size, 4);
    let partition = t.key_field(3).unwrap();
    assert!(partition.is_partition);
    assert_eq!(partition.match_kind, KeyFieldType::Exact);
    assert_eq!(partition.offset, 2);
}

#[test]
fn const_and_gateway_tables() {
    let info = one_table(
        match_table(json!([]), json!([])),
        json!({"name": "t", "handle": 1, "actions": [], "static_entries": [{"priority": 0}],
               "match_attributes": {"match_type": "match_with_no_key",
                                    "stage_tables": [{"has_attached_gateway": true}]}}),
    );
    assert!(info.table("t").unwrap().is_const);

    let info = one_table(
        match_table(
            json!([{"id": 1, "name": "cond", "match_type": "Exact",
                    "type": {"type": "bytes", "width": 1}}]),
            json!([]),
        ),
        json!({"name": "t", "handle": 1, "actions": [], "static_entries": [],
               "match_attributes": {"match_type": "match_with_no_key",
                                    "stage_tables": [{"has_attached_gateway": true}]}}),
    );
    let t = info.table("t").unwrap();
    assert!(!t.is_const);
    assert_eq!(t.key_field(1).unwrap().offset, UNPACKED_OFFSET);
}

#[test]
fn broken_tables_are_skipped() {
    // A key field the placement document does not position.
    let key = json!([{"id": 1, "name": "f", "match_type": "Exact",
                      "type": {"type": "bytes", "width": 8}}]);
    let info = one_table(
        match_table(key, json!([])),
        json!({"name": "t", "handle": 1, "actions": [], "match_key_fields": []}),
    );
    assert!(info.table("t").is_err());

    // A selector bound to a handle nothing owns.
    let info = one_table(
        json!({"name": "pipe.s", "id": 9, "table_type": "Selector", "size": 4,
               "key": [], "data": []}),
        json!({"name": "s", "handle": 2, "bound_to_action_data_table_handle": 0x99}),
    );
    assert!(info.table("s").is_err());
}

#[test]
fn dynamic_hash_tables() {
    let schema = json!({"tables": [
        {"name": "pipe.hash.configure", "id": 1, "table_type": "DynHashConfigure",
         "size": 1, "key": [], "data": []},
        {"name": "pipe.hash.algorithm", "id": 2, "table_type": "DynHashAlgorithm",
         "size": 1, "key": [], "data": []}
    ]});
    let pipeline = PipelineDocument {
        name: "pipe".to_string(),
        mask: 0,
        context: json!({"tables": [], "dynamic_hash_calculations": [
            {"name": "pipe.hash.configure", "handle": 0x5}
        ]}),
    };
    let info = BfRtInfo::from_documents("p", &[schema], vec![pipeline]).unwrap();
    assert_eq!(info.table("hash.configure").unwrap().kind, TableKind::DynHashCfg);
    assert_eq!(info.table("hash.algorithm").unwrap().kind, TableKind::DynHashAlgorithm);
    assert_eq!(info.table("hash.configure").unwrap().handle, 5);
    assert!(!info.is_optimized_out("pipe.hash.algorithm"));
}

#[test]
fn fields_by_name() {
    let info = load();
    let fwd = info.table("fwd").unwrap();
    assert_eq!(fwd.key_field_by_name("ig_md.port").unwrap().id, 2);
    assert_eq!(fwd.key_field_by_name("hdr.ipv4.dst_addr").unwrap().id, 1);
    assert!(matches!(fwd.key_field_by_name("port"), Err(Error::NotFound(_))));
    assert_eq!(fwd.data_field_by_name("port", Some(SEND)).unwrap().id, 1);
    assert!(fwd.data_field_by_name("port", Some(DROP)).is_err());
}

#[test]
fn keys_must_fit_their_placement() {
    let key = json!([{"id": 1, "name": "f", "match_type": "Exact",
                      "type": {"type": "bytes", "width": 12}}]);
    // A parent too narrow for the slice, and one with no width at all.
    for field in [
        json!({"name": "f", "position": 0, "bit_width_full": 8, "start_bit": 4}),
        json!({"name": "f", "position": 0, "start_bit": 4}),
    ] {
        let info = one_table(
            match_table(key.clone(), json!([])),
            json!({"name": "t", "handle": 1, "actions": [], "match_key_fields": [field]}),
        );
        assert!(matches!(info.table("t"), Err(Error::NotFound(_))));
    }

    let info = one_table(
        match_table(key, json!([])),
        json!({"name": "t", "handle": 1, "actions": [], "match_key_fields": [
            {"name": "f", "position": 0, "bit_width_full": 16, "start_bit": 4}
        ]}),
    );
    let t = info.table("t").unwrap();
    assert!(t.key_field(1).unwrap().is_field_slice);
    let mut key = TableKey::new(t).unwrap();
    key.set_exact(1, 0xabc).unwrap();
    assert_eq!(key.exact(1).unwrap(), 0xabc);
}

fn write_json(path: &Path, value: &serde_json::Value) {
    fs::write(path, serde_json::to_string_pretty(value).unwrap()).unwrap();
}

#[test]
fn load_from_files() {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    fs::create_dir(root.join("pipe")).unwrap();
    write_json(&root.join("bf-rt.json"), &schema());
    write_json(&root.join("pipe/context.json"), &context());
    write_json(
        &root.join("device.json"),
        &json!({"p4_devices": [{"device-id": 0, "p4_programs": [{
            "program-name": "tna",
            "bfrt-config": "bf-rt.json",
            "p4_pipelines": [{"p4_pipeline_name": "pipe", "context": "pipe/context.json",
                              "config": "pipe/tofino.bin", "pipe_scope": [0, 1, 2, 3]}]
        }]}]}),
    );

    let devices = DeviceConfig::from_file(root.join("device.json")).unwrap();
    let program = devices.program(0, "tna").unwrap();
    let driver = StaticPipeDriver::new().with_mask("tna", "pipe", MASK);
    let info = BfRtInfo::load(program, &driver).unwrap();

    assert_eq!(info.table("fwd").unwrap().handle, MASK | 0x11);
    assert_eq!(info.pipeline_scopes(), vec![("pipe", &[0, 1, 2, 3][..])]);
    assert_eq!(info.context_paths(), vec![root.join("pipe/context.json").as_path()]);
    assert_eq!(info.binary_paths(), vec![root.join("pipe/tofino.bin").as_path()]);
    assert_eq!(info.bfrt_files(), &[root.join("bf-rt.json")][..]);

    let shared = ProgramConfig::shared(vec![root.join("bf-rt.json")]);
    let info = BfRtInfo::load(&shared, &driver).unwrap();
    assert!(info.tables().iter().all(|t| t.handle == 0));
    assert!(info.table("$PORT").is_ok());
    assert!(info.pipeline_scopes().is_empty());
    assert!(info.context_paths().is_empty());
}
