use bitcoin::opcodes::all::{
    OP_CHECKSIG, OP_DUP, OP_EQUALVERIFY, OP_HASH160, OP_RESERVED, OP_RETURN,
};
use bitcoin::opcodes::Opcode;
use ecash_coinselect::script::{
    check_minimal_push, decode_script, encode_script, is_minimal_push, is_push_opcode,
    Instruction, Instructions, MinimalPushError, Script, ScriptChunk, MAX_EMBED_SCRIPT_SIZE,
};
use proptest::prelude::*;

fn chunk_strategy() -> impl Strategy<Value = ScriptChunk> {
    prop_oneof![
        any::<u8>()
            .prop_filter("push opcodes carry data", |op| !is_push_opcode(*op))
            .prop_map(|op| ScriptChunk::op(Opcode::from(op))),
        proptest::collection::vec(any::<u8>(), 0..4).prop_map(ScriptChunk::Push),
        proptest::collection::vec(any::<u8>(), 0..100).prop_map(ScriptChunk::Push),
    ]
}

fn script_strategy() -> impl Strategy<Value = Script> {
    proptest::collection::vec(chunk_strategy(), 0..6).prop_map(Script::from)
}

#[test]
fn p2pkh_script_decodes() {
    let bytes = hex_bytes("76a9148dcf6103a371e2c7216cff3b0243c13f5cf63a5a88ac");
    let script = decode_script(&bytes).unwrap();
    assert_eq!(
        script,
        Script::new()
            .push_opcode(OP_DUP)
            .push_opcode(OP_HASH160)
            .push_slice(&bytes[3..23])
            .push_opcode(OP_EQUALVERIFY)
            .push_opcode(OP_CHECKSIG)
    );
    assert_eq!(encode_script(&script).unwrap(), bytes);
    assert!(is_minimal_push(&bytes));
}

#[test]
fn alp_section_decodes() {
    let bytes = hex_bytes(
        "6a503d534c5032000453454e4445e1f25de444e399b6d46fa66e3424c04549a85a14b12bc9a4\
         ddc9cdcdcdcdcd03400600000000e04700000000000000000000",
    );
    let script = decode_script(&bytes).unwrap();
    assert_eq!(script.len(), 3);
    assert_eq!(script.chunks()[0], ScriptChunk::op(OP_RETURN));
    assert_eq!(script.chunks()[1], ScriptChunk::op(OP_RESERVED));
    match &script.chunks()[2] {
        ScriptChunk::Push(section) => {
            assert_eq!(section.len(), 61);
            assert_eq!(&section[..4], b"SLP2");
        }
        other => panic!("expected a push, got {:?}", other),
    }
    assert!(is_minimal_push(&bytes));
}

#[test]
fn non_canonical_pushes_are_reported_with_their_position() {
    // empty data through PUSHDATA1 instead of OP_0
    assert_eq!(
        check_minimal_push(&[0x6a, 0x4c, 0x00]),
        Err(MinimalPushError::NonMinimal {
            index: 1,
            opcode: 0x4c
        })
    );
    // 5 through a direct push instead of OP_5
    assert_eq!(
        check_minimal_push(&[0x6a, 0x00, 0x01, 0x05]),
        Err(MinimalPushError::NonMinimal {
            index: 2,
            opcode: 0x01
        })
    );
    assert!(matches!(
        check_minimal_push(&[0x6a, 0x4d, 0x05]),
        Err(MinimalPushError::Malformed(_))
    ));
}

#[test]
fn single_zero_byte_push_is_minimal() {
    // OP_0 pushes empty data, so one zero byte has no shorter form
    assert!(is_minimal_push(&[0x01, 0x00]));
    assert_eq!(check_minimal_push(&[0x6a, 0x01, 0x00]), Ok(()));
    assert_eq!(
        encode_script(&Script::new().push_slice([0u8])).unwrap(),
        vec![0x01, 0x00]
    );
    assert_eq!(
        decode_script(&[0x01, 0x00]).unwrap(),
        Script::from(vec![ScriptChunk::Push(vec![0x00])])
    );
    // while an empty push through a length byte is not
    assert!(!is_minimal_push(&[0x4c, 0x00]));
}

#[test]
fn instructions_report_implicit_push_data() {
    let instructions = Instructions::new(&[0x00, 0x4f, 0x55, 0x6a])
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    let data = instructions
        .iter()
        .map(|instruction| match instruction {
            Instruction::Push { data, .. } => Some(data.to_vec()),
            Instruction::Op(_) => None,
        })
        .collect::<Vec<_>>();
    assert_eq!(
        data,
        vec![Some(vec![]), Some(vec![0x81]), Some(vec![5]), None]
    );
}

proptest! {
    #[test]
    fn encoded_scripts_round_trip(script in script_strategy()) {
        match encode_script(&script) {
            Ok(bytes) => {
                prop_assert!(bytes.len() <= MAX_EMBED_SCRIPT_SIZE);
                prop_assert_eq!(decode_script(&bytes).unwrap(), script);
                prop_assert!(is_minimal_push(&bytes));
            }
            Err(e) => {
                prop_assert!(
                    matches!(e, ecash_coinselect::script::Error::ScriptTooLarge { .. }),
                    "unexpected error {}",
                    e
                );
            }
        }
    }

    #[test]
    fn malformed_scripts_are_never_minimal(bytes in proptest::collection::vec(any::<u8>(), 0..300)) {
        let decoded = decode_script(&bytes);
        let checked = check_minimal_push(&bytes);
        if matches!(checked, Err(MinimalPushError::Malformed(_))) {
            prop_assert!(decoded.is_err());
        }
        if decoded.is_err() {
            prop_assert!(checked.is_err());
            prop_assert!(!is_minimal_push(&bytes));
        }
    }

    #[test]
    fn direct_push_of_small_integers_is_not_minimal(n in 1u8..=16) {
        prop_assert!(!is_minimal_push(&[0x01, n]));
        prop_assert!(is_minimal_push(&[0x50 + n]));
    }
}

fn hex_bytes(s: &str) -> Vec<u8> {
    hex::decode(s).unwrap()
}
