#![allow(dead_code)]

use questview::{DatasetGateway, GatewayConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Three questions with two case variants of "what".
pub const QUESTIONS_CSV: &str = "\
question_id,question,answer
1,What is X,x
2,How to Y,y
3,what about Z,z
";

/// Two distinct questions among five raw rows.
pub const TWO_DISTINCT_CSV: &str = "\
question_id,question,answer
10,Why A,first
11,Why B,first
12,Why A,second
13,Why B,second
14,Why A,third
";

/// Three raw rows with one duplicate pair.
pub const ONE_DUPLICATE_PAIR_CSV: &str = "\
question_id,question,answer
1,Why A,first
2,Why B,first
3,Why A,second
";

/// Five distinct questions with an extra `source` column.
pub const FIVE_WITH_SOURCE_CSV: &str = "\
question_id,question,answer,source
1,q1,a,web
2,q2,b,web
3,q3,c,forum
4,q4,d,web
5,q5,e,forum
";

/// Five distinct questions.
pub const FIVE_DISTINCT_CSV: &str = "\
question_id,question,answer
1,q1,a
2,q2,b
3,q3,c
4,q4,d
5,q5,e
";

pub fn write_csv(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// A temp dir holding `content` as `questions.csv`, and a gateway over it.
pub fn gateway_for(content: &str) -> (TempDir, PathBuf, DatasetGateway) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let path = write_csv(dir.path(), "questions.csv", content);
    let gateway = DatasetGateway::open(GatewayConfig::new(&path)).unwrap();
    (dir, path, gateway)
}

/// `n` rows with `question_id` 0..n, every third question repeating an earlier one,
/// and a `score` column with many ties.
pub fn generated_csv(n: usize) -> String {
    let mut out = String::from("question_id,question,score\n");
    for i in 0..n {
        let question = if i % 3 == 2 {
            format!("Question {}", i - 2)
        } else {
            format!("Question {}", i)
        };
        out.push_str(&format!("{},{},{}\n", i, question, i % 4));
    }
    out
}
