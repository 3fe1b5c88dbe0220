//! `tinydb` — an interactive line-oriented shell over the storage engine.
//!
//! Usage:
//!   tinydb <db_path>
//!
//! Commands:
//!   insert <id> <username> <email>   insert a row
//!   select                           print every row, in key order
//!   .constants                       dump the engine's size constants
//!   .btree                           print the tree structure
//!   .exit                            flush and quit

use std::io::{self, Write};
use std::process::ExitCode;

use tinydb::{Database, OpenOptions, TreeNode};

const ROW_SIZE: usize = 293;
const USERNAME_OFFSET: usize = 4;
const USERNAME_SIZE: usize = 33;
const EMAIL_OFFSET: usize = USERNAME_OFFSET + USERNAME_SIZE;
const EMAIL_SIZE: usize = 256;
const USERNAME_MAX_CHARS: usize = USERNAME_SIZE - 1;
const EMAIL_MAX_CHARS: usize = EMAIL_SIZE - 1;

fn serialize_row(id: u32, username: &str, email: &str) -> Result<Vec<u8>, String> {
    if username.len() > USERNAME_MAX_CHARS || email.len() > EMAIL_MAX_CHARS {
        return Err("String is too long.".to_string());
    }

    let mut buf = vec![0u8; ROW_SIZE];
    buf[0..4].copy_from_slice(&id.to_le_bytes());
    buf[USERNAME_OFFSET..USERNAME_OFFSET + username.len()].copy_from_slice(username.as_bytes());
    buf[EMAIL_OFFSET..EMAIL_OFFSET + email.len()].copy_from_slice(email.as_bytes());
    Ok(buf)
}

fn deserialize_row(id: u32, payload: &[u8]) -> String {
    let username_end = payload[USERNAME_OFFSET..USERNAME_OFFSET + USERNAME_SIZE]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(USERNAME_SIZE);
    let email_end = payload[EMAIL_OFFSET..EMAIL_OFFSET + EMAIL_SIZE]
        .iter()
        .position(|&b| b == 0)
        .unwrap_or(EMAIL_SIZE);

    let username =
        String::from_utf8_lossy(&payload[USERNAME_OFFSET..USERNAME_OFFSET + username_end]);
    let email = String::from_utf8_lossy(&payload[EMAIL_OFFSET..EMAIL_OFFSET + email_end]);

    format!("({id}, {username}, {email})")
}

fn print_tree(node: &TreeNode, indent: usize) {
    let pad = "  ".repeat(indent);
    if node.is_leaf {
        println!("{pad}- leaf (page {}) {:?}", node.page_num, node.keys);
    } else {
        println!("{pad}- internal (page {}) {:?}", node.page_num, node.keys);
        for child in &node.children {
            print_tree(child, indent + 1);
        }
    }
}

fn run_meta_command(db: &mut Database, command: &str) {
    match command {
        ".constants" => {
            let c = db.constants();
            println!("ROW_SIZE: {}", c.row_size);
            println!("COMMON_NODE_HEADER_SIZE: {}", c.common_node_header_size);
            println!("LEAF_NODE_HEADER_SIZE: {}", c.leaf_node_header_size);
            println!("LEAF_NODE_CELL_SIZE: {}", c.leaf_node_cell_size);
            println!("LEAF_NODE_MAX_CELLS: {}", c.leaf_node_max_cells);
            println!("INTERNAL_NODE_MAX_CELLS: {}", c.internal_node_max_cells);
        }
        ".btree" => match db.export_tree() {
            Ok(tree) => print_tree(&tree, 0),
            Err(e) => eprintln!("Error: {e}"),
        },
        other => println!("Unrecognized command '{other}'"),
    }
}

fn run_statement(db: &mut Database, line: &str) {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("insert") => {
            let id = parts.next().and_then(|s| s.parse::<u32>().ok());
            let username = parts.next();
            let email = parts.next();

            let (id, username, email) = match (id, username, email) {
                (Some(id), Some(username), Some(email)) => (id, username, email),
                _ => {
                    println!("Syntax error. Could not parse statement.");
                    return;
                }
            };

            match serialize_row(id, username, email) {
                Ok(payload) => match db.insert(id, &payload) {
                    Ok(()) => println!("Executed."),
                    Err(e) => println!("Error: {e}"),
                },
                Err(e) => println!("Error: {e}"),
            }
        }
        Some("select") => match db.select() {
            Ok(rows) => {
                for (key, payload) in rows {
                    println!("{}", deserialize_row(key, &payload));
                }
                println!("Executed.");
            }
            Err(e) => println!("Error: {e}"),
        },
        Some(other) => {
            println!("Unrecognized keyword at start of '{other}'.");
        }
        None => {}
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("Must supply a database filename.");
            return ExitCode::FAILURE;
        }
    };

    let mut db = match Database::open(OpenOptions::new(&path, ROW_SIZE)) {
        Ok(db) => db,
        Err(e) => {
            eprintln!("Unable to open database file: {e}");
            return ExitCode::FAILURE;
        }
    };

    let stdin = io::stdin();
    let mut line = String::new();

    loop {
        print!("db > ");
        io::stdout().flush().ok();

        line.clear();
        if stdin.read_line(&mut line).unwrap_or(0) == 0 {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if trimmed == ".exit" {
            break;
        }
        if trimmed.starts_with('.') {
            run_meta_command(&mut db, trimmed);
            continue;
        }

        run_statement(&mut db, trimmed);
    }

    match db.close() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
