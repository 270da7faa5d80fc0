//! Shortest edit script between two line sequences (Myers, O(ND))

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EditKind {
    Equal,
    Delete,
    Insert,
}

/// One step of the script. `base` and `patched` are the line indices the
/// step sits at in either sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Edit {
    pub kind: EditKind,
    pub base: usize,
    pub patched: usize,
}

const UNREACHED: isize = -1;

/// Where a path on diagonal `k` at cost `d` comes from, given the furthest
/// points at cost `d - 1`. Returns the previous diagonal and the x the
/// path continues from on `k`.
fn predecessor<F>(get: F, k: isize, d: isize, n: isize, m: isize) -> Option<(isize, isize)>
where
    F: Fn(isize) -> isize,
{
    let down = if k < d {
        let px = get(k + 1);
        (px != UNREACHED && px - (k + 1) < m).then_some((k + 1, px))
    } else {
        None
    };
    let right = if k > -d {
        let px = get(k - 1);
        (px != UNREACHED && px < n).then_some((k - 1, px + 1))
    } else {
        None
    };
    match (down, right) {
        (Some(down), Some(right)) if right.1 > down.1 => Some(right),
        (Some(down), _) => Some(down),
        (None, right) => right,
    }
}

/// Edits turning `a` into `b`. Deletions come before insertions within a
/// changed region.
pub(crate) fn edit_script<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Edit> {
    let prefix = a.iter().zip(b).take_while(|(x, y)| x == y).count();
    let suffix = a[prefix..]
        .iter()
        .rev()
        .zip(b[prefix..].iter().rev())
        .take_while(|(x, y)| x == y)
        .count();

    let mut script: Vec<Edit> = (0..prefix)
        .map(|i| Edit {
            kind: EditKind::Equal,
            base: i,
            patched: i,
        })
        .collect();

    let middle_a = &a[prefix..a.len() - suffix];
    let middle_b = &b[prefix..b.len() - suffix];
    for edit in middle(middle_a, middle_b) {
        script.push(Edit {
            kind: edit.kind,
            base: edit.base + prefix,
            patched: edit.patched + prefix,
        });
    }

    let a_tail = a.len() - suffix;
    let b_tail = b.len() - suffix;
    script.extend((0..suffix).map(|i| Edit {
        kind: EditKind::Equal,
        base: a_tail + i,
        patched: b_tail + i,
    }));
    script
}

fn middle<T: PartialEq>(a: &[T], b: &[T]) -> Vec<Edit> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let max = n + m;
    let offset = max;
    let mut v = vec![UNREACHED; 2 * max as usize + 3];
    // trace[d] holds the furthest x on diagonals -d..=d after step d
    let mut trace: Vec<Vec<isize>> = Vec::new();

    'search: for d in 0..=max {
        let mut k = -d;
        while k <= d {
            let start = if d == 0 {
                Some(0)
            } else {
                predecessor(|kk| v[(kk + offset) as usize], k, d, n, m).map(|(_, x)| x)
            };
            let idx = (k + offset) as usize;
            match start {
                Some(mut x) => {
                    let mut y = x - k;
                    while x < n && y < m && a[x as usize] == b[y as usize] {
                        x += 1;
                        y += 1;
                    }
                    v[idx] = x;
                    if x == n && y == m {
                        break 'search;
                    }
                }
                None => v[idx] = UNREACHED,
            }
            k += 2;
        }
        trace.push(v[(offset - d) as usize..=(offset + d) as usize].to_vec());
    }

    backtrack(a, b, &trace)
}

fn backtrack<T>(a: &[T], b: &[T], trace: &[Vec<isize>]) -> Vec<Edit> {
    let n = a.len() as isize;
    let m = b.len() as isize;
    let mut x = n;
    let mut y = m;
    let mut edits = Vec::new();

    for d in (1..=trace.len() as isize).rev() {
        let previous = &trace[(d - 1) as usize];
        let get = |k: isize| previous[(k + d - 1) as usize];
        let k = x - y;
        let Some((prev_k, _)) = predecessor(get, k, d, n, m) else {
            break;
        };
        let prev_x = get(prev_k);
        let prev_y = prev_x - prev_k;
        let (start_x, start_y) = if prev_k == k + 1 {
            (prev_x, prev_y + 1)
        } else {
            (prev_x + 1, prev_y)
        };
        while x > start_x && y > start_y {
            x -= 1;
            y -= 1;
            edits.push(Edit {
                kind: EditKind::Equal,
                base: x as usize,
                patched: y as usize,
            });
        }
        if prev_k == k + 1 {
            edits.push(Edit {
                kind: EditKind::Insert,
                base: prev_x as usize,
                patched: prev_y as usize,
            });
        } else {
            edits.push(Edit {
                kind: EditKind::Delete,
                base: prev_x as usize,
                patched: prev_y as usize,
            });
        }
        x = prev_x;
        y = prev_y;
    }
    while x > 0 && y > 0 {
        x -= 1;
        y -= 1;
        edits.push(Edit {
            kind: EditKind::Equal,
            base: x as usize,
            patched: y as usize,
        });
    }

    edits.reverse();
    edits
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(a: &[&str], b: &[&str]) -> String {
        edit_script(a, b)
            .iter()
            .map(|e| match e.kind {
                EditKind::Equal => format!(" {}", a[e.base]),
                EditKind::Delete => format!("-{}", a[e.base]),
                EditKind::Insert => format!("+{}", b[e.patched]),
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    #[test]
    fn test_classic_example() {
        let a = ["A", "B", "C", "A", "B", "B", "A"];
        let b = ["C", "B", "A", "B", "A", "C"];
        let script = edit_script(&a, &b);
        let edits = script.iter().filter(|e| e.kind != EditKind::Equal).count();
        assert_eq!(edits, 5);
        let kept: Vec<_> = script
            .iter()
            .filter(|e| e.kind == EditKind::Equal)
            .map(|e| a[e.base])
            .collect();
        assert_eq!(kept.len(), 4);
    }

    #[test]
    fn test_replacement_orders_delete_first() {
        assert_eq!(render(&["a", "b", "c"], &["a", "x", "c"]), " a,-b,+x, c");
    }

    #[test]
    fn test_empty_sides() {
        assert_eq!(render(&[], &["x", "y"]), "+x,+y");
        assert_eq!(render(&["x"], &[]), "-x");
        assert_eq!(render(&[], &[]), "");
    }

    #[test]
    fn test_script_reconstructs_both_sides() {
        let a = ["fn", "a", "b", "c", "end", "tail"];
        let b = ["fn", "b", "c2", "c", "extra", "end"];
        let script = edit_script(&a, &b);
        let base: Vec<_> = script
            .iter()
            .filter(|e| e.kind != EditKind::Insert)
            .map(|e| a[e.base])
            .collect();
        let patched: Vec<_> = script
            .iter()
            .filter(|e| e.kind != EditKind::Delete)
            .map(|e| b[e.patched])
            .collect();
        assert_eq!(base, a);
        assert_eq!(patched, b);
    }
}
