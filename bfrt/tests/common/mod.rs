use bfrt::{BfRtInfo, PipelineDocument};
use serde_json::{json, Value};

pub const MASK: u32 = 0x0100_0000;

pub const FWD: u32 = 0x0100_0001;
pub const ECMP: u32 = 0x0200_0002;
pub const PORT_MD: u32 = 0x0100_000a;
pub const AP: u32 = 0x1100_0001;
pub const CNT: u32 = 0x1200_0001;
pub const EGRESS_CNT: u32 = 0x1200_0002;
pub const SEL: u32 = 0x1300_0001;
pub const MTR: u32 = 0x1400_0001;
pub const REG: u32 = 0x1500_0001;
pub const PORT: u32 = 0x3000_0001;

pub const SEND: u32 = 0x2000_0001;
pub const DROP: u32 = 0x2000_0002;
pub const SET_PORT: u32 = 0x2000_0003;

fn uint32_key(id: u32, name: &str) -> Value {
    json!({"id": id, "name": name, "match_type": "Exact", "type": {"type": "uint32"}})
}

fn singleton(id: u32, name: &str, ty: Value) -> Value {
    json!({"mandatory": false, "read_only": false,
           "singleton": {"id": id, "name": name, "repeated": false, "type": ty}})
}

pub fn schema() -> Value {
    json!({"schema_version": "1.0.0", "tables": [
        {
            "name": "pipe.ingress.fwd", "id": FWD, "table_type": "MatchAction_Direct",
            "size": 1024, "has_const_default_action": false,
            "key": [
                {"id": 1, "name": "hdr.ipv4.dst_addr", "match_type": "LPM",
                 "type": {"type": "bytes", "width": 32}},
                {"id": 2, "name": "ig_md.port", "match_type": "Exact",
                 "type": {"type": "bytes", "width": 9}}
            ],
            "action_specs": [
                {"id": SEND, "name": "ingress.send", "data": [
                    {"id": 1, "name": "port", "repeated": false, "mandatory": true,
                     "read_only": false, "type": {"type": "bytes", "width": 9}},
                    {"id": 2, "name": "idx", "repeated": false, "mandatory": true,
                     "read_only": false, "type": {"type": "bytes", "width": 10}},
                    {"id": 3, "name": "gone", "repeated": false, "mandatory": true,
                     "read_only": false, "type": {"type": "bytes", "width": 8}}
                ]},
                {"id": DROP, "name": "ingress.drop", "data": []}
            ],
            "data": [singleton(65553, "$COUNTER_SPEC_PKTS", json!({"type": "uint64"}))],
            "supported_operations": ["SyncCounters"],
            "attributes": ["IdleTimeout", "EntryScope"]
        },
        {
            "name": "pipe.ingress.ecmp", "id": ECMP,
            "table_type": "MatchAction_Indirect_Selector", "size": 256,
            "key": [{"id": 1, "name": "hdr.ipv4.dst_addr", "match_type": "Exact",
                     "type": {"type": "bytes", "width": 32}}],
            "action_specs": [],
            "data": [
                singleton(65555, "$ACTION_MEMBER_ID", json!({"type": "uint32"})),
                singleton(65556, "$SELECTOR_GROUP_ID", json!({"type": "uint32"}))
            ]
        },
        {
            "name": "pipe.ingress.ap", "id": AP, "table_type": "Action", "size": 256,
            "key": [uint32_key(65557, "$ACTION_MEMBER_ID")],
            "action_specs": [
                {"id": SET_PORT, "name": "ingress.set_port", "data": [
                    {"id": 1, "name": "port", "repeated": false, "mandatory": true,
                     "read_only": false, "type": {"type": "bytes", "width": 9}}
                ]}
            ],
            "data": []
        },
        {
            "name": "pipe.ingress.sel", "id": SEL, "table_type": "Selector", "size": 64,
            "key": [uint32_key(65558, "$SELECTOR_GROUP_ID")],
            "data": [
                {"mandatory": false, "read_only": false, "singleton": {
                    "id": 1, "name": "$ACTION_MEMBER_ID", "repeated": true,
                    "type": {"type": "uint32"}}},
                {"mandatory": false, "read_only": false, "singleton": {
                    "id": 2, "name": "$ACTION_MEMBER_STATUS", "repeated": true,
                    "type": {"type": "bool"}}},
                singleton(3, "$MAX_GROUP_SIZE", json!({"type": "uint32", "default_value": 120}))
            ]
        },
        {
            "name": "pipe.ingress.cnt", "id": CNT, "table_type": "Counter", "size": 512,
            "key": [uint32_key(65556, "$COUNTER_INDEX")],
            "data": [singleton(65553, "$COUNTER_SPEC_PKTS", json!({"type": "uint64"}))],
            "supported_operations": ["Sync"]
        },
        {
            "name": "pipe.egress.cnt", "id": EGRESS_CNT, "table_type": "Counter", "size": 512,
            "key": [uint32_key(65556, "$COUNTER_INDEX")],
            "data": [singleton(65554, "$COUNTER_SPEC_BYTES", json!({"type": "uint64"}))]
        },
        {
            "name": "pipe.ingress.mtr", "id": MTR, "table_type": "Meter", "size": 128,
            "key": [uint32_key(65556, "$METER_INDEX")],
            "data": [
                singleton(1, "$METER_SPEC_CIR_KBPS", json!({"type": "uint64"})),
                singleton(2, "$METER_SPEC_PIR_KBPS", json!({"type": "uint64"}))
            ]
        },
        {
            "name": "pipe.ingress.reg", "id": REG, "table_type": "Register", "size": 128,
            "key": [uint32_key(65556, "$REGISTER_INDEX")],
            "data": [
                singleton(2, "ingress.reg.f1", json!({"type": "bytes", "width": 32})),
                singleton(1, "ingress.reg.f0", json!({"type": "bytes", "width": 32}))
            ],
            "supported_operations": ["Sync"]
        },
        {
            "name": "pipe.ingress.port_md", "id": PORT_MD, "table_type": "PortMetadata",
            "size": 288,
            "key": [{"id": 1, "name": "ig_intr_md.ingress_port", "match_type": "Exact",
                     "type": {"type": "bytes", "width": 9}}],
            "action_specs": [],
            "data": [
                singleton(1, "ig_md.lag", json!({"type": "bytes", "width": 16})),
                singleton(2, "ig_md.vrf", json!({"type": "bytes", "width": 8}))
            ]
        },
        {
            "name": "pipe.ingress.unused", "id": 0x0100_0009, "table_type": "MatchAction_Direct",
            "size": 16, "key": [], "action_specs": [], "data": []
        },
        {
            "name": "$PORT", "id": PORT, "table_type": "PortConfigure", "size": 512,
            "key": [uint32_key(1, "$DEV_PORT")],
            "data": [
                {"mandatory": true, "read_only": false, "singleton": {
                    "id": 1, "name": "$SPEED", "repeated": false,
                    "type": {"type": "string", "choices": ["BF_SPEED_10G", "BF_SPEED_100G"]}}},
                singleton(2, "$PORT_ENABLE", json!({"type": "bool", "default_value": false}))
            ],
            "supported_apis": {"tableEntryAdd": {}, "tableEntryDel": {}, "tableEntryGet": {}},
            "attributes": ["port_status_notif_cb", "IdleTimeout"]
        }
    ]})
}

pub fn context() -> Value {
    json!({"program_name": "tna", "tables": [
        {
            "name": "ingress.fwd", "handle": 0x11, "table_type": "match",
            "match_attributes": {"match_type": "exact", "stage_tables": [{
                "action_format": [
                    {"action_handle": 0x2000_0011, "immediate_fields": [{"param_name": "port"}]}
                ]
            }]},
            "match_key_fields": [
                {"name": "hdr.ipv4.dst_addr", "position": 1, "bit_width_full": 32, "start_bit": 0},
                {"name": "ig_md.port", "position": 0, "bit_width_full": 9, "start_bit": 0}
            ],
            "statistics_table_refs": [
                {"name": "ingress.cnt", "handle": 0x31, "how_referenced": "indirect"}
            ],
            "actions": [
                {"name": "ingress.send", "handle": 0x2000_0011,
                 "p4_parameters": [{"name": "port"}, {"name": "idx"}, {"name": "gone"}],
                 "indirect_resources": [
                     {"parameter_name": "idx", "resource_name": "ingress.cnt", "access_mode": "index"}
                 ]},
                {"name": "ingress.drop", "handle": 0x2000_0012, "p4_parameters": []},
                {"name": "ingress.hidden", "handle": 0x2000_0013, "p4_parameters": []}
            ]
        },
        {
            "name": "ingress.ecmp", "handle": 0x61, "table_type": "match",
            "match_attributes": {"match_type": "exact", "stage_tables": [{}]},
            "match_key_fields": [
                {"name": "hdr.ipv4.dst_addr", "position": 0, "bit_width_full": 32, "start_bit": 0}
            ],
            "action_data_table_refs": [
                {"name": "ingress.ap", "handle": 0x41, "how_referenced": "indirect"}
            ],
            "selection_table_refs": [
                {"name": "ingress.sel", "handle": 0x51, "how_referenced": "indirect"}
            ],
            "meter_table_refs": [
                {"name": "ingress.mtr", "handle": 0x71, "how_referenced": "direct"}
            ],
            "actions": [
                {"name": "ingress.set_port", "handle": 0x2000_0021,
                 "p4_parameters": [{"name": "port"}]}
            ]
        },
        {
            "name": "ingress.ap", "handle": 0x41, "table_type": "action",
            "actions": [
                {"name": "ingress.set_port", "handle": 0x2000_0021,
                 "p4_parameters": [{"name": "port"}]}
            ]
        },
        {"name": "ingress.sel", "handle": 0x51, "table_type": "selection",
         "bound_to_action_data_table_handle": 0x41},
        {"name": "ingress.cnt", "handle": 0x31, "table_type": "statistics"},
        {"name": "egress.cnt", "handle": 0x32, "table_type": "statistics"},
        {"name": "ingress.mtr", "handle": 0x71, "table_type": "meter"},
        {"name": "ingress.reg", "handle": 0x81, "table_type": "stateful"},
        {
            "name": "ingress.reg_shadow", "handle": 0x91, "table_type": "match",
            "stateful_table_refs": [
                {"name": "ingress.reg", "handle": 0x81, "how_referenced": "direct"}
            ]
        },
        {
            "name": "ingress.port_md", "handle": 0xa1, "table_type": "phase0_match",
            "match_attributes": {"match_type": "exact"},
            "match_key_fields": [
                {"name": "ig_intr_md.ingress_port", "position": 0, "bit_width_full": 9,
                 "start_bit": 0}
            ],
            "actions": [{"name": "ingress.set_port_metadata", "handle": 0x2000_00a1}]
        }
    ]})
}

pub fn pipeline() -> PipelineDocument {
    PipelineDocument {
        name: "pipe".to_string(),
        mask: MASK,
        context: context(),
    }
}

pub fn load() -> BfRtInfo {
    BfRtInfo::from_documents("tna", &[schema()], vec![pipeline()]).unwrap()
}
