// 文字列類似度 (最長一致ブロック方式)
//
// 編集距離ではなく Ratcliff/Obershelp 方式。最長の一致ブロックを見つけ、
// その左右を再帰的に探索して一致文字数 M を数え、2*M / (len(a) + len(b)) を返す。
// 文字単位 (Unicode スカラー値) で比較する。

use std::collections::HashMap;

/// 2つの文字列の類似度 (0.0〜1.0)
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matcher = Matcher::new(&a, &b);
    2.0 * matcher.matched_chars() as f64 / total as f64
}

struct Matcher<'a> {
    a: &'a [char],
    b_len: usize,
    // b の文字 → 出現位置 (昇順)
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> Matcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }
        Matcher { a, b_len: b.len(), b2j }
    }

    /// 一致ブロックの合計文字数
    fn matched_chars(&self) -> usize {
        let mut matched = 0;
        let mut queue = vec![(0, self.a.len(), 0, self.b_len)];

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }

        matched
    }

    /// a[alo..ahi] と b[blo..bhi] の最長一致 (i, j, size)。同じ長さなら a, b とも先頭寄りを優先
    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let a = self.a;
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);

        // j2len[j] = a[..=i] と b[..=j] の末尾一致長
        let mut j2len: HashMap<usize, usize> = HashMap::new();
        for i in alo..ahi {
            let mut next: HashMap<usize, usize> = HashMap::new();
            if let Some(positions) = self.b2j.get(&a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = j
                        .checked_sub(1)
                        .and_then(|p| j2len.get(&p))
                        .copied()
                        .unwrap_or(0)
                        + 1;
                    next.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next;
        }

        (best_i, best_j, best_size)
    }
}
