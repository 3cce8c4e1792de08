//! Directed service graph: adjacency, Tarjan SCC decomposition, and a
//! Kahn topological sort over the SCC condensation.
//!
//! Cycles are tolerated by design — the condensation over strongly
//! connected components is always acyclic, so a plain topological sort
//! applies to it even when the underlying graph does not.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use crate::error::PipelineError;

#[derive(Debug, Clone)]
pub struct Graph {
    downstream: HashMap<String, Vec<String>>,
    upstream: HashMap<String, Vec<String>>,
    /// Insertion order of every node name, used both for Kahn's initial
    /// queue tie-breaking and for appending any node the sort doesn't
    /// otherwise reach.
    order: Vec<String>,
}

impl Graph {
    /// Builds the graph from a forward adjacency map and the insertion
    /// order of every known service name. Every downstream name must
    /// already be a key in `order`.
    pub fn new(
        downstream: HashMap<String, Vec<String>>,
        order: Vec<String>,
    ) -> Result<Self, PipelineError> {
        let known: HashSet<&str> = order.iter().map(String::as_str).collect();
        for (source, targets) in &downstream {
            for target in targets {
                if !known.contains(target.as_str()) {
                    return Err(PipelineError::UnknownDownstream {
                        source: source.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        let mut upstream: HashMap<String, Vec<String>> =
            order.iter().map(|n| (n.clone(), Vec::new())).collect();
        for name in &order {
            if let Some(targets) = downstream.get(name) {
                for target in targets {
                    upstream.get_mut(target).expect("validated above").push(name.clone());
                }
            }
        }

        Ok(Self {
            downstream,
            upstream,
            order,
        })
    }

    pub fn nodes(&self) -> &[String] {
        &self.order
    }

    pub fn downstream(&self, name: &str) -> &[String] {
        self.downstream.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn upstream(&self, name: &str) -> &[String] {
        self.upstream.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Tarjan's algorithm, iterative to avoid recursion depth limits on
    /// deep chains. Returns SCCs in the order each root finished
    /// popping; within an SCC, nodes are in stack-pop order.
    pub fn tarjan_scc(&self) -> Vec<Vec<String>> {
        let node_index: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, n)| (n.as_str(), i))
            .collect();
        let n = self.order.len();
        let adj: Vec<Vec<usize>> = self
            .order
            .iter()
            .map(|name| {
                self.downstream(name)
                    .iter()
                    .map(|d| node_index[d.as_str()])
                    .collect()
            })
            .collect();

        let mut indices: Vec<Option<usize>> = vec![None; n];
        let mut lowlink: Vec<usize> = vec![0; n];
        let mut on_stack: Vec<bool> = vec![false; n];
        let mut stack: Vec<usize> = Vec::new();
        let mut sccs: Vec<Vec<String>> = Vec::new();
        let mut counter = 0usize;

        for start in 0..n {
            if indices[start].is_some() {
                continue;
            }
            let mut call_stack: Vec<(usize, usize)> = vec![(start, 0)];
            indices[start] = Some(counter);
            lowlink[start] = counter;
            counter += 1;
            stack.push(start);
            on_stack[start] = true;

            while let Some(&mut (v, ref mut child_idx)) = call_stack.last_mut() {
                if *child_idx < adj[v].len() {
                    let w = adj[v][*child_idx];
                    *child_idx += 1;
                    if indices[w].is_none() {
                        indices[w] = Some(counter);
                        lowlink[w] = counter;
                        counter += 1;
                        stack.push(w);
                        on_stack[w] = true;
                        call_stack.push((w, 0));
                    } else if on_stack[w] {
                        lowlink[v] = lowlink[v].min(indices[w].expect("checked Some above"));
                    }
                } else {
                    call_stack.pop();
                    if let Some(&(parent, _)) = call_stack.last() {
                        lowlink[parent] = lowlink[parent].min(lowlink[v]);
                    }
                    if lowlink[v] == indices[v].expect("v was indexed on entry") {
                        let mut scc = Vec::new();
                        loop {
                            let w = stack.pop().expect("v is still on stack");
                            on_stack[w] = false;
                            scc.push(self.order[w].clone());
                            if w == v {
                                break;
                            }
                        }
                        sccs.push(scc);
                    }
                }
            }
        }
        sccs
    }

    /// Kahn's algorithm over the SCC condensation, appending any node
    /// the sort does not reach in insertion order.
    pub fn condensation_topological_order(&self) -> Vec<String> {
        let sccs = self.tarjan_scc();
        let scc_of: HashMap<&str, usize> = sccs
            .iter()
            .enumerate()
            .flat_map(|(i, scc)| scc.iter().map(move |n| (n.as_str(), i)))
            .collect();

        let mut scc_adj: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); sccs.len()];
        let mut in_degree = vec![0usize; sccs.len()];
        for (i, scc) in sccs.iter().enumerate() {
            for node in scc {
                for downstream in self.downstream(node) {
                    let j = scc_of[downstream.as_str()];
                    if j != i && scc_adj[i].insert(j) {
                        in_degree[j] += 1;
                    }
                }
            }
        }

        let mut queue: VecDeque<usize> =
            (0..sccs.len()).filter(|&i| in_degree[i] == 0).collect();
        let mut scc_order = Vec::with_capacity(sccs.len());
        while let Some(i) = queue.pop_front() {
            scc_order.push(i);
            for &j in &scc_adj[i] {
                in_degree[j] -= 1;
                if in_degree[j] == 0 {
                    queue.push_back(j);
                }
            }
        }

        let mut result = Vec::with_capacity(self.order.len());
        let mut emitted: HashSet<&str> = HashSet::new();
        for i in scc_order {
            for node in &sccs[i] {
                result.push(node.clone());
                emitted.insert(node.as_str());
            }
        }
        // The condensation is always a DAG reachable from every SCC node,
        // so this loop is defensive rather than load-bearing.
        for name in &self.order {
            if !emitted.contains(name.as_str()) {
                result.push(name.clone());
            }
        }
        result
    }
}
