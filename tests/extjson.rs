//! Extended JSON conversion tests, including the `$type` / `$regex` /
//! `$options` ambiguity matrix and the legacy v1 binary form.

use pretty_assertions::assert_eq;
use tobson::Decoder;

enum Expect {
    Bytes(&'static str),
    Error(&'static str),
}

struct Case {
    label: &'static str,
    input: &'static str,
    expect: Expect,
}

fn run_cases(cases: &[Case]) {
    for case in cases {
        let mut out = Vec::new();
        let result = tobson::decode_one_extended(case.input, &mut out);
        match &case.expect {
            Expect::Bytes(expected) => {
                if let Err(e) = result {
                    panic!("{}: unexpected error: {e}", case.label);
                }
                assert_eq!(
                    hex::encode(&out),
                    expected.to_lowercase(),
                    "{}",
                    case.label
                );
            }
            Expect::Error(fragment) => {
                let err = match result {
                    Err(e) => e,
                    Ok(()) => panic!(
                        "{}: expected error, got {}",
                        case.label,
                        hex::encode(&out)
                    ),
                };
                let message = err.to_string();
                assert!(
                    message.contains(fragment),
                    "{}: error {message:?} does not contain {fragment:?}",
                    case.label
                );
            }
        }
    }
}

#[test]
fn object_id() {
    run_cases(&[
        Case {
            label: "$oid",
            input: r#"{"a" : {"$oid" : "56e1fc72e0c917e9c4714161"}}"#,
            expect: Expect::Bytes("1400000007610056E1FC72E0C917E9C471416100"),
        },
        Case {
            label: "$oid bad hex",
            input: r#"{"a" : {"$oid" : "56e1fc72e0c917e9c471416g"}}"#,
            expect: Expect::Error("ill-formed $oid"),
        },
        Case {
            label: "$oid too short",
            input: r#"{"a" : {"$oid" : "56e1fc72"}}"#,
            expect: Expect::Error("falls short of expected length"),
        },
    ]);
}

#[test]
fn symbols_and_keys() {
    run_cases(&[
        Case {
            label: "$symbol",
            input: r#"{"a": {"$symbol": ""}}"#,
            expect: Expect::Bytes("0D0000000E6100010000000000"),
        },
        Case {
            label: "$maxKey",
            input: r#"{"a" : {"$maxKey" : 1}}"#,
            expect: Expect::Bytes("080000007F610000"),
        },
        Case {
            label: "$minKey",
            input: r#"{"a" : {"$minKey" : 1}}"#,
            expect: Expect::Bytes("08000000FF610000"),
        },
        Case {
            label: "$minKey bad value",
            input: r#"{"a" : {"$minKey" : 2}}"#,
            expect: Expect::Error("expecting '1'"),
        },
        Case {
            label: "$undefined",
            input: r#"{"a" : {"$undefined" : true}}"#,
            expect: Expect::Bytes("0800000006610000"),
        },
        Case {
            label: "$undefined bad value",
            input: r#"{"a" : {"$undefined" : false}}"#,
            expect: Expect::Error("expecting 't'"),
        },
    ]);
}

#[test]
fn numbers() {
    run_cases(&[
        Case {
            label: "$numberInt",
            input: r#"{"i" : {"$numberInt": "0"}}"#,
            expect: Expect::Bytes("0C0000001069000000000000"),
        },
        Case {
            label: "$numberInt out of range",
            input: r#"{"i" : {"$numberInt": "2147483648"}}"#,
            expect: Expect::Error("int conversion"),
        },
        Case {
            label: "$numberLong",
            input: r#"{"a" : {"$numberLong" : "-9223372036854775808"}}"#,
            expect: Expect::Bytes("10000000126100000000000000008000"),
        },
        Case {
            label: "$numberDouble",
            input: r#"{"d" : {"$numberDouble": "1.23456789012345677E+18"}}"#,
            expect: Expect::Bytes("1000000001640081E97DF41022B14300"),
        },
        Case {
            label: "$numberDouble NaN",
            input: r#"{"d": {"$numberDouble": "NaN"}}"#,
            expect: Expect::Bytes("10000000016400000000000000F87F00"),
        },
        Case {
            label: "$numberDouble Inf",
            input: r#"{"d": {"$numberDouble": "Infinity"}}"#,
            expect: Expect::Bytes("10000000016400000000000000F07F00"),
        },
        Case {
            label: "$numberDouble -Inf",
            input: r#"{"d": {"$numberDouble": "-Infinity"}}"#,
            expect: Expect::Bytes("10000000016400000000000000F0FF00"),
        },
        Case {
            label: "$numberDecimal",
            input: r#"{"d" : {"$numberDecimal" : "0.1000000000000000000000000000000000"}}"#,
            expect: Expect::Bytes("18000000136400000000000A5BC138938D44C64D31FC2F00"),
        },
        Case {
            label: "$numberDecimal bad literal",
            input: r#"{"d" : {"$numberDecimal" : "1.2.3"}}"#,
            expect: Expect::Error("can't parse Decimal128"),
        },
    ]);
}

#[test]
fn binary_v2() {
    run_cases(&[
        Case {
            label: "$binary",
            input: r#"{"x" : { "$binary" : {"base64" : "c//SZESzTGmQ6OfR38A11A==", "subType" : "03"}}}"#,
            expect: Expect::Bytes("1D000000057800100000000373FFD26444B34C6990E8E7D1DFC035D400"),
        },
        Case {
            label: "$binary, hex type",
            input: r#"{"x" : { "$binary" : {"base64" : "c//SZESzTGmQ6OfR38A11A==", "subType" : "F0"}}}"#,
            expect: Expect::Bytes("1D00000005780010000000F073FFD26444B34C6990E8E7D1DFC035D400"),
        },
        Case {
            label: "$binary, empty payload",
            input: r#"{"x" : { "$binary" : {"base64" : "", "subType" : "03"}}}"#,
            expect: Expect::Bytes("0D000000057800000000000300"),
        },
        Case {
            label: "$binary subtype 0x02",
            input: r#"{"x" : { "$binary" : {"base64" : "//8=", "subType" : "02"}}}"#,
            expect: Expect::Bytes("13000000057800060000000202000000FFFF00"),
        },
        Case {
            label: "$binary, subtype too long",
            input: r#"{"x" : { "$binary" : {"base64" : "c//SZESzTGmQ6OfR38A11A==", "subType" : "123"}}}"#,
            expect: Expect::Error("exceeds expected length"),
        },
        Case {
            label: "$binary, single type digit",
            input: r#"{"x" : { "$binary" : {"base64" : "c//SZESzTGmQ6OfR38A11A==", "subType" : "3"}}}"#,
            expect: Expect::Bytes("1D000000057800100000000373FFD26444B34C6990E8E7D1DFC035D400"),
        },
        Case {
            label: "$binary, keys reversed",
            input: r#"{"x" : { "$binary" : {"subType" : "03", "base64" : "c//SZESzTGmQ6OfR38A11A=="}}}"#,
            expect: Expect::Bytes("1D000000057800100000000373FFD26444B34C6990E8E7D1DFC035D400"),
        },
        Case {
            label: "$binary subtype 0x02, keys reversed",
            input: r#"{"x" : { "$binary" : {"subType" : "02", "base64" : "//8="}}}"#,
            expect: Expect::Bytes("13000000057800060000000202000000FFFF00"),
        },
        Case {
            label: "$binary, bad payload",
            input: r#"{"x" : { "$binary" : {"base64" : "a", "subType" : "00"}}}"#,
            expect: Expect::Error("error parsing base64 data"),
        },
        Case {
            label: "$binary, unknown key",
            input: r#"{"x" : { "$binary" : {"payload" : "//8=", "subType" : "00"}}}"#,
            expect: Expect::Error("invalid key for $binary document"),
        },
        Case {
            label: "$binary, repeated key",
            input: r#"{"x" : { "$binary" : {"subType" : "00", "subType" : "01"}}}"#,
            expect: Expect::Error("subType repeated"),
        },
    ]);
}

#[test]
fn binary_v1_legacy() {
    run_cases(&[
        Case {
            label: "$binary legacy",
            input: r#"{"x" : { "$binary" : "c//SZESzTGmQ6OfR38A11A==", "$type" : "03"}}"#,
            expect: Expect::Bytes("1D000000057800100000000373FFD26444B34C6990E8E7D1DFC035D400"),
        },
        Case {
            label: "$binary legacy, hex type",
            input: r#"{"x" : { "$binary" : "c//SZESzTGmQ6OfR38A11A==", "$type" : "F0"}}"#,
            expect: Expect::Bytes("1D00000005780010000000F073FFD26444B34C6990E8E7D1DFC035D400"),
        },
        Case {
            label: "$binary legacy, single type digit",
            input: r#"{"x" : { "$binary" : "c//SZESzTGmQ6OfR38A11A==", "$type" : "3"}}"#,
            expect: Expect::Bytes("1D000000057800100000000373FFD26444B34C6990E8E7D1DFC035D400"),
        },
        Case {
            label: "$binary legacy, subtype 0x02",
            input: r#"{"x" : { "$binary" : "//8=", "$type" : "02"}}"#,
            expect: Expect::Bytes("13000000057800060000000202000000FFFF00"),
        },
        Case {
            label: "$binary legacy, keys reversed",
            input: r#"{"x" : { "$type" : "03", "$binary" : "c//SZESzTGmQ6OfR38A11A==" }}"#,
            expect: Expect::Bytes("1D000000057800100000000373FFD26444B34C6990E8E7D1DFC035D400"),
        },
        Case {
            label: "$binary legacy, keys reversed, hex type",
            input: r#"{"x" : { "$type" : "F0", "$binary" : "c//SZESzTGmQ6OfR38A11A==" }}"#,
            expect: Expect::Bytes("1D00000005780010000000F073FFD26444B34C6990E8E7D1DFC035D400"),
        },
        Case {
            label: "$binary legacy, subtype 0x02, keys reversed",
            input: r#"{"x" : { "$type" : "02", "$binary" : "//8="}}"#,
            expect: Expect::Bytes("13000000057800060000000202000000FFFF00"),
        },
    ]);
}

#[test]
fn code_and_scope() {
    run_cases(&[
        Case {
            label: "$code",
            input: r#"{"a" : {"$code" : "abababababab"}}"#,
            expect: Expect::Bytes("190000000D61000D0000006162616261626162616261620000"),
        },
        Case {
            label: "$code $scope",
            input: r#"{"a" : {"$code" : "abcd", "$scope" : {}}}"#,
            expect: Expect::Bytes("1A0000000F610012000000050000006162636400050000000000"),
        },
        Case {
            label: "$code $scope, keys reversed",
            input: r#"{"a" : {"$scope" : {}, "$code" : "abcd"}}"#,
            expect: Expect::Bytes("1A0000000F610012000000050000006162636400050000000000"),
        },
        Case {
            label: "$scope with nonempty document",
            input: r#"{"a" : {"$code" : "x", "$scope" : {"b":true}}}"#,
            expect: Expect::Bytes("1b0000000f61001300000002000000780009000000086200010000"),
        },
        Case {
            label: "$code followed by junk key",
            input: r#"{"a" : {"$code" : "x", "$nope" : 1}}"#,
            expect: Expect::Error("expected \"$scope\""),
        },
    ]);
}

#[test]
fn scope_first_leaves_stream_aligned() {
    // The terminator of the extended object must be consumed so the next
    // document in the stream parses.
    let mut decoder = Decoder::new(&br#"{"a":{"$scope":{},"$code":"x"}} {"b":true}"#[..])
        .unwrap()
        .with_extended_json(true);
    let mut first = Vec::new();
    assert!(decoder.decode_document(&mut first).unwrap());
    assert_eq!(
        hex::encode(&first),
        "170000000f61000f000000020000007800050000000000"
    );
    let mut second = Vec::new();
    assert!(decoder.decode_document(&mut second).unwrap());
    assert_eq!(hex::encode(&second), "090000000862000100");
    let mut rest = Vec::new();
    assert!(!decoder.decode_document(&mut rest).unwrap());
}

#[test]
fn timestamps() {
    run_cases(&[
        Case {
            label: "$timestamp",
            input: r#"{"a" : {"$timestamp" : {"t" : 123456789, "i" : 42} } }"#,
            expect: Expect::Bytes("100000001161002A00000015CD5B0700"),
        },
        Case {
            label: "$timestamp, keys reversed",
            input: r#"{"a" : {"$timestamp" : {"i" : 42, "t" : 123456789} } }"#,
            expect: Expect::Bytes("100000001161002A00000015CD5B0700"),
        },
        Case {
            label: "$timestamp, bad t number",
            input: r#"{"":{"$timestamp":{"t":00,"i":0}}}"#,
            expect: Expect::Error("leading zeros not allowed"),
        },
        Case {
            label: "$timestamp, bad i number",
            input: r#"{"":{"$timestamp":{"t":0,"i":00}}}"#,
            expect: Expect::Error("leading zeros not allowed"),
        },
        Case {
            label: "$timestamp, non-numeric i",
            input: r#"{"":{"$timestamp":{"t":0,"i":a}}}"#,
            expect: Expect::Error("invalid character in number"),
        },
        Case {
            label: "$timestamp, missing i number",
            input: r#"{"":{"$timestamp":{"t":0,"i":}}}"#,
            expect: Expect::Error("number not found"),
        },
        Case {
            label: "$timestamp, negative t",
            input: r#"{"":{"$timestamp":{"t":-1,"i":0}}}"#,
            expect: Expect::Error("int conversion"),
        },
        Case {
            label: "$timestamp, repeated key",
            input: r#"{"":{"$timestamp":{"t":0,"t":1}}}"#,
            expect: Expect::Error("key 't' repeated"),
        },
    ]);
}

#[test]
fn regular_expressions() {
    run_cases(&[
        Case {
            label: "$regularExpression",
            input: r#"{"a" : {"$regularExpression" : { "pattern": "abc", "options" : "im"}}}"#,
            expect: Expect::Bytes("0F0000000B610061626300696D0000"),
        },
        Case {
            label: "$regularExpression, keys reversed",
            input: r#"{"a" : {"$regularExpression" : {"options" : "im", "pattern": "abc"}}}"#,
            expect: Expect::Bytes("0F0000000B610061626300696D0000"),
        },
        Case {
            label: "$regularExpression, options unsorted",
            input: r#"{"a" : {"$regularExpression" : { "pattern": "abc", "options" : "mi"}}}"#,
            expect: Expect::Bytes("0F0000000B610061626300696D0000"),
        },
        Case {
            label: "$regularExpression, single option",
            input: r#"{"a" : {"$regularExpression" : { "pattern": "abc", "options" : "s"}}}"#,
            expect: Expect::Bytes("0e0000000b610061626300730000"),
        },
        Case {
            label: "$regularExpression, illegal options",
            input: r#"{"a" : {"$regularExpression" : { "pattern": "abc", "options" : "i0"}}}"#,
            expect: Expect::Error("invalid regular expression option '0'"),
        },
        Case {
            label: "$regularExpression, unknown key",
            input: r#"{"a" : {"$regularExpression" : { "pattern": "abc", "flavors" : "im"}}}"#,
            expect: Expect::Error("invalid key for $regularExpression document"),
        },
    ]);
}

#[test]
fn legacy_regex() {
    run_cases(&[
        Case {
            label: "$regex string",
            input: r#"{"a" : {"$regex" : "abc", "$options" : "im"}}"#,
            expect: Expect::Bytes("0F0000000B610061626300696D0000"),
        },
        Case {
            label: "$regex string, keys reversed",
            input: r#"{"a" : {"$options" : "im", "$regex" : "abc"}}"#,
            expect: Expect::Bytes("0F0000000B610061626300696D0000"),
        },
        Case {
            label: "$regex string, keys reversed, options unsorted",
            input: r#"{"a" : {"$options" : "mi", "$regex" : "abc"}}"#,
            expect: Expect::Bytes("0F0000000B610061626300696D0000"),
        },
        Case {
            label: "$regex string, single option",
            input: r#"{"a" : {"$regex" : "abc", "$options" : "s"}}"#,
            expect: Expect::Bytes("0e0000000b610061626300730000"),
        },
        Case {
            label: "$regex string, illegal options",
            input: r#"{"a" : {"$regex" : "abc", "$options" : "i0"}}"#,
            expect: Expect::Error("invalid regular expression option '0'"),
        },
        Case {
            label: "$regex string, keys reversed, illegal options",
            input: r#"{"a" : {"$options" : "i0", "$regex" : "abc"}}"#,
            expect: Expect::Error("invalid regular expression option '0'"),
        },
        Case {
            label: "$regex document is a query",
            input: r#"{"a" : { "$regex": {"$regularExpression" : { "pattern": "abc", "options" : "im"}}, "$options" : "s"}}"#,
            expect: Expect::Bytes("2c000000036100240000000b2472656765780061626300696d0002246f7074696f6e73000200000073000000"),
        },
        Case {
            label: "$regex document is a query, keys reversed",
            input: r#"{"a" : { "$options" : "s", "$regex": {"$regularExpression" : { "pattern": "abc", "options" : "im"}}}}"#,
            expect: Expect::Bytes("2c0000000361002400000002246f7074696f6e73000200000073000b2472656765780061626300696d000000"),
        },
        Case {
            label: "$regex not extended JSON nor query",
            input: r#"{"":{"$regex":"","options" : "im"}}"#,
            expect: Expect::Bytes("2900000003002200000002247265676578000100000000026f7074696f6e730003000000696d000000"),
        },
        Case {
            label: "$regex with extra key",
            input: r#"{"":{"$regex":"","$ne": "a", "$options" : "im"}}"#,
            expect: Expect::Bytes("3500000003002e0000000224726567657800010000000002246e650002000000610002246f7074696f6e730003000000696d000000"),
        },
        Case {
            label: "$regex trailing extra key",
            input: r#"{"":{"$regex":"abc","$options" : "im", "$ne":"a"}}"#,
            expect: Expect::Bytes("380000000300310000000224726567657800040000006162630002246f7074696f6e730003000000696d0002246e65000200000061000000"),
        },
        Case {
            label: "$options not extended JSON nor query",
            input: r#"{"":{"$options":"","000" : ""}}"#,
            expect: Expect::Bytes("2500000003001e00000002246f7074696f6e73000100000000023030300001000000000000"),
        },
        Case {
            label: "$options with extra key",
            input: r#"{"":{"$options":"","$ne" : "a","$regex" : "abc"}}"#,
            expect: Expect::Bytes("3600000003002f00000002246f7074696f6e7300010000000002246e6500020000006100022472656765780004000000616263000000"),
        },
        Case {
            label: "$options then regex then extra key",
            input: r#"{"":{"$options":"","$regex" : "abc", "$ne":"a"}}"#,
            expect: Expect::Bytes("3600000003002f00000002246f7074696f6e730001000000000224726567657800040000006162630002246e65000200000061000000"),
        },
    ]);
}

#[test]
fn type_ambiguity() {
    run_cases(&[
        Case {
            label: "top level $symbol is a plain key",
            input: r#"{"$symbol": "abc"}"#,
            expect: Expect::Bytes("16000000022473796d626f6c00040000006162630000"),
        },
        Case {
            label: "lone $type with empty subtype string",
            input: r#"{"":{"$type":""}}"#,
            expect: Expect::Error("error decoding binary $type"),
        },
        Case {
            label: "lone $type with oversized subtype string",
            input: r#"{"":{"$type":"123"}}"#,
            expect: Expect::Error("error decoding binary $type"),
        },
        Case {
            label: "$type with numeric value",
            input: r#"{"":{"$type":7}}"#,
            expect: Expect::Bytes("1700000003001000000010247479706500070000000000"),
        },
        Case {
            label: "$type with $numberInt value",
            input: r#"{"":{"$type":{"$numberInt":"7"}}}"#,
            expect: Expect::Bytes("1700000003001000000010247479706500070000000000"),
        },
        Case {
            label: "$type with extra keys",
            input: r#"{"":{"$type":"00", "$binary":"//8=", "$ne":"a"}}"#,
            expect: Expect::Bytes("370000000300300000000224747970650003000000303000022462696e61727900050000002f2f383d0002246e65000200000061000000"),
        },
        Case {
            label: "nested $type query",
            input: r#"{"":{"$type":{"$type":0}}}"#,
            expect: Expect::Bytes("2300000003001c00000003247479706500100000001024747970650000000000000000"),
        },
    ]);
}

#[test]
fn db_pointer() {
    run_cases(&[
        Case {
            label: "$dbPointer",
            input: r#"{"a": {"$dbPointer": {"$ref": "b", "$id": {"$oid": "56e1fc72e0c917e9c4714161"}}}}"#,
            expect: Expect::Bytes("1A0000000C610002000000620056E1FC72E0C917E9C471416100"),
        },
        Case {
            label: "$dbPointer, keys reversed",
            input: r#"{"a": {"$dbPointer": {"$id": {"$oid": "56e1fc72e0c917e9c4714161"}, "$ref": "b"}}}"#,
            expect: Expect::Bytes("1A0000000C610002000000620056E1FC72E0C917E9C471416100"),
        },
        Case {
            label: "$dbPointer, invalid key",
            input: r#"{"":{"$dbPointer":{"abc":""}}}"#,
            expect: Expect::Error("invalid key for $dbPointer"),
        },
        Case {
            label: "$dbPointer, short key",
            input: r#"{"":{"$dbPointer":{"":""}}}"#,
            expect: Expect::Error("falls short of expected length"),
        },
        Case {
            label: "$dbPointer, $id not an object id",
            input: r#"{"":{"$dbPointer":{"$ref":"b","$id":"abc"}}}"#,
            expect: Expect::Error("$dbPointer.$id must be BSON type"),
        },
    ]);
}

#[test]
fn dates() {
    run_cases(&[
        Case {
            label: "$date, numberLong",
            input: r#"{"a" : {"$date" : {"$numberLong" : "0"}}}"#,
            expect: Expect::Bytes("10000000096100000000000000000000"),
        },
        Case {
            label: "$date, negative numberLong",
            input: r#"{"a" : {"$date" : {"$numberLong" : "-1000"}}}"#,
            expect: Expect::Bytes("1000000009610018FCFFFFFFFFFFFF00"),
        },
        Case {
            label: "$date, ISO 8601 epoch",
            input: r#"{"a" : {"$date" : "1970-01-01T00:00:00Z"}}"#,
            expect: Expect::Bytes("10000000096100000000000000000000"),
        },
        Case {
            label: "$date, ISO 8601 same day",
            input: r#"{"a":{"$date":"1970-01-01T20:00:00Z"}}"#,
            expect: Expect::Bytes("1000000009610000a24a040000000000"),
        },
        Case {
            label: "$date, ISO 8601 with offset",
            input: r#"{"a":{"$date":"1970-01-01T01:00:00+01:00"}}"#,
            expect: Expect::Bytes("10000000096100000000000000000000"),
        },
        Case {
            label: "$date, ISO 8601 with offset sans colon",
            input: r#"{"a":{"$date":"1970-01-01T01:00:00+0100"}}"#,
            expect: Expect::Bytes("10000000096100000000000000000000"),
        },
        Case {
            label: "$date, numeric literal",
            input: r#"{"a":{"$date":253402300800000}}"#,
            expect: Expect::Bytes("1000000009610000DC1FD277E6000000"),
        },
        Case {
            label: "$date, invalid object",
            input: r#"{"a" : {"$date" : {"00000" : "0"}}}"#,
            expect: Expect::Error("expected \"$numberLong\""),
        },
        Case {
            label: "$date, invalid value",
            input: r#"{"":{"$date":}}}"#,
            expect: Expect::Error("invalid value for $date"),
        },
        Case {
            label: "$date, malformed string",
            input: r#"{"":{"$date":"not-a-datetime-string"}}"#,
            expect: Expect::Error("invalid $date value string"),
        },
    ]);
}

#[test]
fn unrecognized_dollar_keys_stay_documents() {
    run_cases(&[
        Case {
            label: "wrong length key",
            input: r#"{"a":{"$foo":1}}"#,
            expect: Expect::Bytes("170000000361000f0000001024666f6f00010000000000"),
        },
        Case {
            label: "right length, wrong key",
            input: r#"{"a":{"$oidx":"y"}}"#,
            expect: Expect::Bytes("1a0000000361001200000002246f696478000200000079000000"),
        },
    ]);
}

#[test]
fn extended_json_off_keeps_documents() {
    let mut out = Vec::new();
    tobson::decode_one(r#"{"a":{"$oid":"56e1fc72e0c917e9c4714161"}}"#, &mut out).unwrap();
    // Plain document element, not an ObjectId.
    assert_eq!(out[4], 0x03);
}

#[test]
fn deeply_nested_extended_values() {
    // Extended values inside arrays and subdocuments.
    let mut out = Vec::new();
    tobson::decode_one_extended(
        r#"{"a":[{"$numberInt":"5"}],"b":{"c":{"$minKey":1}}}"#,
        &mut out,
    )
    .unwrap();
    // array element 0 is int32 5; "c" is MinKey.
    assert_eq!(
        hex::encode(&out),
        "1f0000000461000c000000103000050000000003620008000000ff63000000"
    );
}
