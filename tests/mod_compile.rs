use bson::{Bson, Document, doc};
use nexusquery::executor::FindOptions;
use nexusquery::query::{Mutation, compile_update, like_to_regex};
use nexusquery::{Command, Connection, Operator, Order};

fn filter_of(q: &nexusquery::query::Builder) -> Document {
    q.to_filter().unwrap()
}

#[test]
fn unfiltered_is_empty_document() {
    let conn = Connection::memory();
    assert_eq!(filter_of(&conn.collection("users")), Document::new());
}

#[test]
fn and_chain_extends_one_and_list() {
    let conn = Connection::memory();
    let q = conn
        .collection("users")
        .where_eq("a", 1)
        .where_cmp("b", Operator::Gt, 2)
        .where_eq("c", "x");
    assert_eq!(
        filter_of(&q),
        doc! { "$and": [{"a": 1}, {"b": {"$gt": 2}}, {"c": "x"}] }
    );
}

#[test]
fn or_wraps_everything_before_it() {
    let conn = Connection::memory();
    let q = conn.collection("users").where_eq("a", 1).where_eq("b", 2).or_where_eq("c", 3);
    assert_eq!(
        filter_of(&q),
        doc! { "$or": [{"$and": [{"a": 1}, {"b": 2}]}, {"c": 3}] }
    );
}

#[test]
fn nested_group_is_parenthesized() {
    let conn = Connection::memory();
    let q = conn
        .collection("users")
        .where_eq("a", 1)
        .where_nested(|g| g.where_eq("b", 2).or_where_eq("c", 3));
    assert_eq!(
        filter_of(&q),
        doc! { "$and": [{"a": 1}, {"$or": [{"b": 2}, {"c": 3}]}] }
    );
}

#[test]
fn not_equal_requires_presence() {
    let conn = Connection::memory();
    let q = conn.collection("users").where_op("a", "<>", 1).unwrap();
    assert_eq!(filter_of(&q), doc! { "a": {"$exists": true, "$ne": 1} });
}

#[test]
fn between_forms() {
    let conn = Connection::memory();
    let inside = conn.collection("users").where_between("age", 18, 65);
    assert_eq!(filter_of(&inside), doc! { "age": {"$gte": 18, "$lte": 65} });
    let outside = conn.collection("users").where_not_between("age", 18, 65);
    assert_eq!(
        filter_of(&outside),
        doc! { "$or": [{"age": {"$lt": 18}}, {"age": {"$gt": 65}}] }
    );
    assert!(conn.collection("users").where_op("age", "between", 3).unwrap().to_filter().is_err());
}

#[test]
fn like_compiles_to_case_insensitive_regex() {
    let conn = Connection::memory();
    let q = conn.collection("users").where_like("name", "%doe");
    assert_eq!(filter_of(&q), doc! { "name": {"$regex": "doe$", "$options": "i"} });
    assert_eq!(like_to_regex("a.b%"), "^a\\.b");
    assert_eq!(like_to_regex("100\\%"), "^100%$");
}

#[test]
fn id_values_are_normalized() {
    let conn = Connection::memory();
    let oid = bson::oid::ObjectId::new();
    let q = conn.collection("users").where_eq("_id", oid.to_hex());
    assert_eq!(filter_of(&q), doc! { "_id": oid });

    let bad = conn.collection("users").where_eq("_id", "abcd");
    assert_eq!(filter_of(&bad), doc! { "_id": {"$in": []} });

    let many = conn.collection("users").where_in("_id", [oid.to_hex(), "nope".to_string()]);
    assert_eq!(filter_of(&many), doc! { "_id": {"$in": [oid]} });
}

#[test]
fn raw_with_empty_field_is_the_fragment() {
    let conn = Connection::memory();
    let q = conn.collection("users").where_op("", "raw", doc! { "x": {"$gt": 1} }).unwrap();
    assert_eq!(filter_of(&q), doc! { "x": {"$gt": 1} });
}

#[test]
fn date_parts_use_expr() {
    let conn = Connection::memory();
    let q = conn.collection("users").where_month("birthday", 3);
    assert_eq!(filter_of(&q), doc! { "$expr": {"$eq": [{"$month": "$birthday"}, 3]} });
}

#[test]
fn find_command_carries_options() {
    let conn = Connection::memory();
    let q = conn
        .collection("users")
        .where_eq("active", true)
        .select(["name as full_name", "age"])
        .unwrap()
        .order_by("age", Order::Desc)
        .offset(5)
        .limit(10);
    let Command::Find { collection, filter, options } = q.to_read_command().unwrap() else {
        panic!("expected a find command");
    };
    assert_eq!(collection, "users");
    assert_eq!(filter, doc! { "active": true });
    assert_eq!(
        options,
        FindOptions {
            projection: Some(doc! { "name": 1, "age": 1 }),
            sort: Some(doc! { "age": -1 }),
            skip: Some(5),
            limit: Some(10),
        }
    );
}

#[test]
fn computed_fields_switch_to_aggregate() {
    let conn = Connection::memory();
    let q = conn
        .collection("users")
        .where_eq("a", 1)
        .add_field("sum", doc! { "$add": ["$a", "$b"] })
        .add_field("sum", doc! { "$add": ["$a", 1] })
        .limit(3);
    let Command::Aggregate { pipeline, .. } = q.to_read_command().unwrap() else {
        panic!("expected an aggregate command");
    };
    assert_eq!(
        pipeline,
        vec![
            doc! { "$match": {"a": 1} },
            doc! { "$addFields": {"sum": {"$add": ["$a", 1]}} },
            doc! { "$limit": 3_i64 },
        ]
    );
}

#[test]
fn update_directives_share_buckets() {
    let update = compile_update(&[
        Mutation::Set("a".into(), Bson::Int32(1)),
        Mutation::Set("b".into(), Bson::Int32(2)),
        Mutation::Increment("n".into(), Bson::Int32(3)),
        Mutation::Unset("gone".into()),
        Mutation::Push { field: "tags".into(), value: bson::bson!(["x", "y"]), unique: true },
        Mutation::Pull { field: "old".into(), value: Bson::String("z".into()) },
    ])
    .unwrap();
    assert_eq!(
        update,
        doc! {
            "$set": {"a": 1, "b": 2},
            "$inc": {"n": 3},
            "$unset": {"gone": ""},
            "$addToSet": {"tags": {"$each": ["x", "y"]}},
            "$pull": {"old": "z"},
        }
    );
    assert!(compile_update(&[]).is_err());
}

#[test]
fn builders_fork_independently() {
    let conn = Connection::memory();
    let base = conn.collection("users").where_eq("a", 1);
    let left = base.clone().where_eq("b", 2);
    let right = base.clone().or_where_eq("c", 3);
    assert_eq!(filter_of(&base), doc! { "a": 1 });
    assert_eq!(filter_of(&left), doc! { "$and": [{"a": 1}, {"b": 2}] });
    assert_eq!(filter_of(&right), doc! { "$or": [{"a": 1}, {"c": 3}] });
}
